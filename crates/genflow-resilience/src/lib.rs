//! # genflow-resilience
//!
//! Provider health tracking and failure policy for Genflow.
//!
//! Three pieces: a per-provider [`CircuitBreaker`] (closed / open /
//! half-open), a process-wide [`HealthRegistry`] of breakers shared by
//! all router instances, and a pure [`decide`] function that turns a
//! classified failure into retry-same / use-fallback / give-up.

mod circuit_breaker;
mod fallback;
mod health;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use fallback::{
    decide, FallbackAction, FallbackConfig, FallbackContext, FallbackDecision, FallbackReason,
};
pub use health::HealthRegistry;
