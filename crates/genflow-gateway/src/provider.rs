//! Provider capability trait and wire-level types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request sent to a text-generation provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRequest {
    /// Task identifier, for provider-side logging and tracing
    pub task_name: String,
    /// Rendered prompt text
    pub prompt: String,
    /// Optional token cap for the response
    pub max_tokens: Option<u32>,
    /// Call timeout in seconds; the caller enforces it
    pub timeout_secs: u64,
}

impl GatewayRequest {
    pub fn new(task_name: impl Into<String>, prompt: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            task_name: task_name.into(),
            prompt: prompt.into(),
            max_tokens: None,
            timeout_secs,
        }
    }
}

/// Normalized successful provider response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    /// Generated text
    pub content: String,
    /// Tokens consumed, 0 when the provider does not report usage
    #[serde(default)]
    pub tokens_used: u32,
    /// Wall-clock response time in milliseconds
    #[serde(default)]
    pub response_time_ms: u64,
}

/// Classified provider failure
///
/// The variants line up with the failure reasons the resilience layer
/// bases its retry/fallback policy on, so classification happens once
/// at the transport boundary instead of by string matching upstream.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("provider call timed out")]
    Timeout,

    #[error("provider rate limited: {0}")]
    RateLimited(String),

    #[error("provider authentication failed: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// Provider returned an explicit error payload
    #[error("provider error: {0}")]
    Provider(String),
}

/// Capability interface every text-generation backend implements
///
/// Implementations must be safe to call repeatedly and concurrently;
/// the router issues tasks sequentially per session but multiple
/// sessions may share one provider instance.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider identifier as used by the routing table
    fn name(&self) -> &str;

    /// Execute one generation request
    async fn execute(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError>;
}
