//! Failure classification and fallback policy
//!
//! [`decide`] is a pure function of the failure reason, the attempt
//! count, and the circuit states involved. It performs no I/O and
//! holds no state, so policy is unit-testable without mocking time or
//! providers.

use crate::circuit_breaker::CircuitState;
use genflow_gateway::GatewayError;
use serde::{Deserialize, Serialize};

/// Classified reason a task attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    Timeout,
    RateLimited,
    AuthError,
    NetworkError,
    MalformedResponse,
    Unknown,
}

impl FallbackReason {
    /// Map a gateway error onto its policy class
    pub fn classify(error: &GatewayError) -> Self {
        match error {
            GatewayError::Timeout => Self::Timeout,
            GatewayError::RateLimited(_) => Self::RateLimited,
            GatewayError::Auth(_) => Self::AuthError,
            GatewayError::Network(_) => Self::NetworkError,
            GatewayError::MalformedResponse(_) => Self::MalformedResponse,
            GatewayError::Provider(_) => Self::Unknown,
        }
    }

    /// Transient failures favor retrying the same provider
    fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::RateLimited | Self::NetworkError)
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::AuthError => write!(f, "auth_error"),
            Self::NetworkError => write!(f, "network_error"),
            Self::MalformedResponse => write!(f, "malformed_response"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// What the router should do about one failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackAction {
    /// Issue the task again against the same provider
    RetrySame,
    /// Switch to the configured fallback provider, once
    UseFallback,
    /// Stop and report the task as failed
    GiveUp,
}

/// Decision plus the reason code behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackDecision {
    pub action: FallbackAction,
    pub reason_code: &'static str,
}

impl FallbackDecision {
    fn new(action: FallbackAction, reason_code: &'static str) -> Self {
        Self {
            action,
            reason_code,
        }
    }
}

/// Resolver tuning
#[derive(Debug, Clone, Copy)]
pub struct FallbackConfig {
    /// Retry budget per task against the same provider
    pub max_retries: u32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self { max_retries: 2 }
    }
}

/// Inputs for one fallback decision
#[derive(Debug, Clone, Copy)]
pub struct FallbackContext {
    /// Why the last attempt failed
    pub reason: FallbackReason,
    /// Failed attempts against the primary so far (>= 1 after a real call)
    pub attempts: u32,
    /// Primary provider circuit state
    pub primary_circuit: CircuitState,
    /// Fallback provider circuit state; `None` when no usable fallback
    /// is configured and registered
    pub fallback_circuit: Option<CircuitState>,
}

fn fallback_or_give_up(ctx: &FallbackContext, reason_code: &'static str) -> FallbackDecision {
    match ctx.fallback_circuit {
        Some(CircuitState::Open) | None => FallbackDecision::new(FallbackAction::GiveUp, reason_code),
        Some(_) => FallbackDecision::new(FallbackAction::UseFallback, reason_code),
    }
}

/// Decide whether to retry, fall back, or give up after one failure
///
/// The retry budget bounds retries regardless of reason, and a
/// fallback provider with an open circuit is never attempted.
pub fn decide(ctx: &FallbackContext, config: &FallbackConfig) -> FallbackDecision {
    // An open primary circuit means retrying the same provider cannot help
    if ctx.primary_circuit == CircuitState::Open {
        return fallback_or_give_up(ctx, "circuit_open");
    }

    match ctx.reason {
        FallbackReason::AuthError => fallback_or_give_up(ctx, "auth_error"),
        FallbackReason::MalformedResponse | FallbackReason::Unknown => {
            // Content-level defects are provider-specific, not transient
            fallback_or_give_up(ctx, "not_transient")
        }
        reason if reason.is_transient() => {
            if ctx.attempts <= config.max_retries {
                FallbackDecision::new(FallbackAction::RetrySame, "transient_retry")
            } else {
                fallback_or_give_up(ctx, "retry_budget_exhausted")
            }
        }
        _ => fallback_or_give_up(ctx, "not_transient"),
    }
}
