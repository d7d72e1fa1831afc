//! # genflow-core
//!
//! Core types for the Genflow document-generation pipeline.
//!
//! Genflow drives a session through a fixed sequence of phases. Each
//! phase issues an ordered list of tasks to external text-generation
//! providers; per-task failures are absorbed by the routing and
//! resilience layers, and the session ends in a terminal
//! completed/failed state.
//!
//! This crate holds the shared data model (sessions, phase and task
//! results, pipeline state), the unified error type, and the TOML
//! configuration.

mod config;
mod error;
mod types;

pub use config::{CircuitConfig, GenflowConfig, ProviderConfig};
pub use error::{GenflowError, Result};
pub use types::*;
