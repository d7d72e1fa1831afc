//! Generic HTTP provider
//!
//! Speaks a minimal JSON contract with a generation endpoint: the
//! request carries the task name, prompt, and optional token cap; the
//! response body is expected to deserialize into [`GatewayResponse`].
//! Status codes are classified into [`GatewayError`] variants at this
//! boundary so the resilience layer never inspects transport details.

use crate::provider::{GatewayError, GatewayRequest, GatewayResponse, Provider};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Instant;

/// HTTP-backed text-generation provider
#[derive(Debug, Clone)]
pub struct HttpProvider {
    name: String,
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct HttpGenerationRequest<'a> {
    task: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl HttpProvider {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            api_key: None,
            client: reqwest::Client::new(),
        }
    }

    /// Attach a bearer token read from the environment variable `env_var`
    ///
    /// A missing variable is not an error here; the provider will fail
    /// with an auth error on first use if the backend requires a token.
    pub fn with_api_key_env(mut self, env_var: &str) -> Self {
        self.api_key = std::env::var(env_var).ok();
        self
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        tracing::debug!(
            provider = %self.name,
            task = %request.task_name,
            "Sending generation request"
        );

        let body = HttpGenerationRequest {
            task: &request.task_name,
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
        };

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let started = Instant::now();
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Network(format!("request to {} failed: {}", self.endpoint, e))
            }
        })?;

        let status = response.status();

        if status.as_u16() == 429 {
            let text = response.text().await.unwrap_or_else(|_| "rate limited".to_string());
            return Err(GatewayError::RateLimited(text));
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            let text = response.text().await.unwrap_or_else(|_| "unauthorized".to_string());
            return Err(GatewayError::Auth(text));
        }

        if status.is_server_error() {
            let text = response.text().await.unwrap_or_else(|_| "server error".to_string());
            return Err(GatewayError::Network(format!("{}: {}", status, text)));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_else(|_| "unknown".to_string());
            return Err(GatewayError::Provider(format!("{}: {}", status, text)));
        }

        let mut parsed: GatewayResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(format!("invalid response body: {}", e)))?;

        if parsed.content.is_empty() {
            return Err(GatewayError::MalformedResponse(
                "response contained no content".to_string(),
            ));
        }

        parsed.response_time_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            provider = %self.name,
            task = %request.task_name,
            chars = parsed.content.len(),
            tokens = parsed.tokens_used,
            elapsed_ms = parsed.response_time_ms,
            "Generation request complete"
        );

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_name() {
        let provider = HttpProvider::new("gemini", "http://localhost:9000/generate");
        assert_eq!(provider.name(), "gemini");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        // Port 9 (discard) is not serving HTTP
        let provider = HttpProvider::new("chatgpt", "http://127.0.0.1:9/generate");
        let request = GatewayRequest::new("brainstorm_chatgpt", "prompt", 5);

        let err = provider.execute(&request).await.unwrap_err();
        assert!(matches!(err, GatewayError::Network(_) | GatewayError::Timeout));
    }
}
