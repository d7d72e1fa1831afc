//! Scripted provider for tests and dry runs
//!
//! Plays back a queued sequence of outcomes, then keeps returning the
//! last configured behavior. Used by router and pipeline tests to
//! exercise retry, fallback, and circuit paths deterministically.

use crate::provider::{GatewayError, GatewayRequest, GatewayResponse, Provider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Provider that replays a scripted outcome sequence
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Result<GatewayResponse, GatewayError>>>,
    calls: AtomicU32,
}

impl ScriptedProvider {
    /// Provider whose every call succeeds with a canned response
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Queue a successful response
    pub fn then_ok(self, content: impl Into<String>) -> Self {
        self.script.lock().unwrap().push_back(Ok(GatewayResponse {
            content: content.into(),
            tokens_used: 42,
            response_time_ms: 5,
        }));
        self
    }

    /// Queue a failure
    pub fn then_err(self, error: GatewayError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    /// Number of calls received so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut script = self.script.lock().unwrap();
        match script.pop_front() {
            Some(outcome) => outcome,
            // Script exhausted (or never set): succeed with an echo
            None => Ok(GatewayResponse {
                content: format!("scripted response for {}", request.task_name),
                tokens_used: 42,
                response_time_ms: 5,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_plays_in_order() {
        let provider = ScriptedProvider::new("claude")
            .then_err(GatewayError::RateLimited("slow down".to_string()))
            .then_ok("second attempt output");
        let request = GatewayRequest::new("validate_claude", "prompt", 5);

        assert!(provider.execute(&request).await.is_err());
        let response = provider.execute(&request).await.unwrap();
        assert_eq!(response.content, "second attempt output");
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_script_echoes() {
        let provider = ScriptedProvider::new("gemini");
        let request = GatewayRequest::new("charts_gemini", "prompt", 5);

        let response = provider.execute(&request).await.unwrap();
        assert!(response.content.contains("charts_gemini"));
    }
}
