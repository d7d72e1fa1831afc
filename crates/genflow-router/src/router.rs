//! Task router: resolve one task to a live provider and execute it
//!
//! The router owns the failure handling for a single task: circuit
//! check before the call, classified failure afterwards, bounded
//! retries against the primary, and at most one fallback attempt
//! whose outcome is final. Provider-level failures leave this layer
//! as a `TaskResult` with `success = false`, never as an error;
//! only configuration defects (missing routing entry, no registered
//! provider at all) propagate as errors.

use crate::table::RoutingTable;
use genflow_core::{DocumentType, GenflowError, Result, TaskResult};
use genflow_gateway::{GatewayError, GatewayRequest, GatewayResponse, Provider, ProviderRegistry};
use genflow_resilience::{
    decide, CircuitState, FallbackAction, FallbackConfig, FallbackContext, FallbackReason,
    HealthRegistry,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Routes one task to its provider and applies retry/fallback policy
pub struct TaskRouter {
    table: RoutingTable,
    registry: Arc<ProviderRegistry>,
    health: HealthRegistry,
    fallback_config: FallbackConfig,
    call_timeout: Duration,
}

impl TaskRouter {
    pub fn new(
        table: RoutingTable,
        registry: Arc<ProviderRegistry>,
        health: HealthRegistry,
        max_retries: u32,
        call_timeout: Duration,
    ) -> Self {
        Self {
            table,
            registry,
            health,
            fallback_config: FallbackConfig { max_retries },
            call_timeout,
        }
    }

    /// Primary provider the table assigns to a task, if mapped
    pub fn primary_for(&self, phase: u32, task: &str, doc_type: DocumentType) -> Option<&str> {
        self.table
            .lookup(phase, task, doc_type)
            .map(|entry| entry.provider.as_str())
    }

    /// Shared health state, for status reporting
    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Execute one task
    ///
    /// Returns `Ok` with a success or failure `TaskResult` for every
    /// runtime outcome. `Err` means a configuration defect
    /// (`RoutingNotFound`, `AgentCallFailed` with nothing registered)
    /// or cancellation.
    pub async fn execute(
        &self,
        phase: u32,
        task: &str,
        prompt: &str,
        doc_type: DocumentType,
        cancel: &CancellationToken,
    ) -> Result<TaskResult> {
        let entry = self.table.lookup(phase, task, doc_type).ok_or_else(|| {
            GenflowError::RoutingNotFound {
                phase,
                task: task.to_string(),
                doc_type: doc_type.to_string(),
            }
        })?;

        // A fallback only counts if it is actually registered
        let fallback_id = entry
            .fallback
            .as_deref()
            .filter(|id| self.registry.contains(id));

        let primary = match self.registry.get(&entry.provider) {
            Some(provider) => provider,
            None => {
                tracing::warn!(
                    phase,
                    task,
                    provider = %entry.provider,
                    "Primary provider not registered"
                );
                // State check only; attempt_fallback claims any
                // half-open trial slot itself.
                if let Some(fb) = fallback_id {
                    if self.health.state(fb) != CircuitState::Open {
                        let prior = format!("primary provider '{}' not registered", entry.provider);
                        return self.attempt_fallback(fb, task, prompt, cancel, prior).await;
                    }
                }
                return Err(GenflowError::AgentCallFailed(format!(
                    "no usable provider for task '{}' (primary '{}' unregistered)",
                    task, entry.provider
                )));
            }
        };

        let breaker = self.health.breaker(&entry.provider);
        let mut attempts: u32 = 0;
        let mut reason = FallbackReason::Unknown;
        let mut errors: Vec<String> = Vec::new();

        loop {
            if cancel.is_cancelled() {
                return Err(GenflowError::Cancelled(format!(
                    "task '{}' cancelled before provider call",
                    task
                )));
            }

            if breaker.can_execute() {
                let outcome = match self.call(primary.as_ref(), task, prompt, cancel).await {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        // No outcome for the claimed half-open trial;
                        // free the slot before propagating.
                        breaker.release_trial();
                        return Err(error);
                    }
                };
                match outcome {
                    Ok(response) => {
                        breaker.record_success();
                        return Ok(Self::success(task, &entry.provider, response));
                    }
                    Err(error) => {
                        breaker.record_failure();
                        attempts += 1;
                        reason = FallbackReason::classify(&error);
                        errors.push(format!("{}: {}", entry.provider, error));
                        tracing::warn!(
                            phase,
                            task,
                            provider = %entry.provider,
                            attempt = attempts,
                            reason = %reason,
                            "Provider call failed"
                        );
                    }
                }
            } else {
                errors.push(format!("{}: circuit open", entry.provider));
            }

            let context = FallbackContext {
                reason,
                attempts,
                primary_circuit: breaker.state(),
                fallback_circuit: fallback_id.map(|fb| self.health.state(fb)),
            };
            let decision = decide(&context, &self.fallback_config);
            tracing::debug!(
                phase,
                task,
                action = ?decision.action,
                code = decision.reason_code,
                "Fallback decision"
            );

            match decision.action {
                FallbackAction::RetrySame => continue,
                FallbackAction::UseFallback => match fallback_id {
                    Some(fb) => {
                        return self
                            .attempt_fallback(fb, task, prompt, cancel, errors.join("; "))
                            .await;
                    }
                    None => break,
                },
                FallbackAction::GiveUp => break,
            }
        }

        Ok(TaskResult::failed(task, entry.provider.clone(), errors.join("; ")))
    }

    /// Single fallback attempt; its outcome is final
    async fn attempt_fallback(
        &self,
        fallback: &str,
        task: &str,
        prompt: &str,
        cancel: &CancellationToken,
        prior_errors: String,
    ) -> Result<TaskResult> {
        let provider = self.registry.get(fallback).ok_or_else(|| {
            GenflowError::AgentCallFailed(format!("fallback provider '{}' not registered", fallback))
        })?;

        tracing::info!(task, provider = %fallback, "Switching to fallback provider");

        let breaker = self.health.breaker(fallback);
        if !breaker.can_execute() {
            return Ok(TaskResult::failed(
                task,
                fallback,
                format!("{}; fallback '{}' circuit open", prior_errors, fallback),
            ));
        }

        match self.call(provider.as_ref(), task, prompt, cancel).await {
            Ok(Ok(response)) => {
                breaker.record_success();
                Ok(Self::success(task, fallback, response))
            }
            Ok(Err(error)) => {
                breaker.record_failure();
                Ok(TaskResult::failed(
                    task,
                    fallback,
                    format!("{}; {}: {}", prior_errors, fallback, error),
                ))
            }
            Err(error) => {
                breaker.release_trial();
                Err(error)
            }
        }
    }

    /// Issue one provider call, bounded by the configured timeout
    ///
    /// The outer error is cancellation (propagates); the inner result
    /// is the gateway outcome, with an elapsed timeout folded into
    /// `GatewayError::Timeout`.
    async fn call(
        &self,
        provider: &dyn Provider,
        task: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<std::result::Result<GatewayResponse, GatewayError>> {
        let request = GatewayRequest::new(task, prompt, self.call_timeout.as_secs());

        tokio::select! {
            _ = cancel.cancelled() => Err(GenflowError::Cancelled(format!(
                "task '{}' cancelled during provider call",
                task
            ))),
            outcome = tokio::time::timeout(self.call_timeout, provider.execute(&request)) => {
                Ok(match outcome {
                    Ok(result) => result,
                    Err(_) => Err(GatewayError::Timeout),
                })
            }
        }
    }

    fn success(task: &str, provider: &str, response: GatewayResponse) -> TaskResult {
        TaskResult::ok(
            task,
            provider,
            response.content,
            response.tokens_used,
            response.response_time_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RoutingEntry;
    use genflow_gateway::ScriptedProvider;

    const DOC: DocumentType = DocumentType::Bizplan;

    fn table_with_fallback() -> RoutingTable {
        RoutingTable::from_entries(vec![RoutingEntry::new(1, "t1", DOC, "provider-a")
            .with_fallback("provider-b")])
        .unwrap()
    }

    fn fast_health() -> HealthRegistry {
        HealthRegistry::new(3, Duration::from_secs(60), Duration::from_secs(60))
    }

    fn router(
        table: RoutingTable,
        providers: Vec<Arc<ScriptedProvider>>,
        health: HealthRegistry,
        max_retries: u32,
    ) -> TaskRouter {
        let mut registry = ProviderRegistry::new();
        for provider in providers {
            registry.register(provider);
        }
        TaskRouter::new(
            table,
            Arc::new(registry),
            health,
            max_retries,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_missing_routing_entry() {
        let r = router(table_with_fallback(), vec![], fast_health(), 1);
        let err = r
            .execute(9, "t1", "prompt", DOC, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GenflowError::RoutingNotFound { phase: 9, .. }));
    }

    #[tokio::test]
    async fn test_primary_success() {
        let a = Arc::new(ScriptedProvider::new("provider-a").then_ok("done"));
        let r = router(table_with_fallback(), vec![a.clone()], fast_health(), 1);

        let result = r
            .execute(1, "t1", "prompt", DOC, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.provider, "provider-a");
        assert_eq!(result.content, "done");
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_retries_then_fallback_succeeds() {
        // Fails twice with rate_limited, retry budget 1: one retry on the
        // primary, then the fallback takes over and succeeds.
        let a = Arc::new(
            ScriptedProvider::new("provider-a")
                .then_err(GatewayError::RateLimited("429".to_string()))
                .then_err(GatewayError::RateLimited("429".to_string())),
        );
        let b = Arc::new(ScriptedProvider::new("provider-b").then_ok("fallback output"));
        let r = router(table_with_fallback(), vec![a.clone(), b.clone()], fast_health(), 1);

        let result = r
            .execute(1, "t1", "prompt", DOC, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.provider, "provider-b");
        assert_eq!(a.calls(), 2);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_auth_error_skips_retries() {
        let a = Arc::new(
            ScriptedProvider::new("provider-a").then_err(GatewayError::Auth("denied".to_string())),
        );
        let b = Arc::new(ScriptedProvider::new("provider-b").then_ok("fallback output"));
        let r = router(table_with_fallback(), vec![a.clone(), b.clone()], fast_health(), 5);

        let result = r
            .execute(1, "t1", "prompt", DOC, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.provider, "provider-b");
        // No retry against the primary despite a generous budget
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test]
    async fn test_fallback_failure_is_final() {
        let a = Arc::new(
            ScriptedProvider::new("provider-a")
                .then_err(GatewayError::MalformedResponse("garbage".to_string())),
        );
        let b = Arc::new(
            ScriptedProvider::new("provider-b")
                .then_err(GatewayError::Network("refused".to_string())),
        );
        let r = router(table_with_fallback(), vec![a.clone(), b.clone()], fast_health(), 2);

        let result = r
            .execute(1, "t1", "prompt", DOC, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.provider, "provider-b");
        let error = result.error.unwrap();
        assert!(error.contains("provider-a"));
        assert!(error.contains("provider-b"));
        // One attempt each, no second-level fallback chain
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_open_fallback_circuit_gives_up_without_calling() {
        let a = Arc::new(
            ScriptedProvider::new("provider-a").then_err(GatewayError::Auth("denied".to_string())),
        );
        let b = Arc::new(ScriptedProvider::new("provider-b"));
        let health = HealthRegistry::new(1, Duration::from_secs(60), Duration::from_secs(60));
        // Pre-open the fallback circuit
        health.record_failure("provider-b");

        let r = router(table_with_fallback(), vec![a.clone(), b.clone()], health, 2);

        let result = r
            .execute(1, "t1", "prompt", DOC, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_give_up_without_fallback() {
        let table = RoutingTable::from_entries(vec![RoutingEntry::new(1, "t1", DOC, "provider-a")])
            .unwrap();
        let a = Arc::new(
            ScriptedProvider::new("provider-a")
                .then_err(GatewayError::Network("down".to_string()))
                .then_err(GatewayError::Network("down".to_string())),
        );
        let r = router(table, vec![a.clone()], fast_health(), 1);

        let result = r
            .execute(1, "t1", "prompt", DOC, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.provider, "provider-a");
        assert_eq!(a.calls(), 2);
    }

    #[tokio::test]
    async fn test_no_provider_registered_at_all() {
        let r = router(table_with_fallback(), vec![], fast_health(), 1);
        let err = r
            .execute(1, "t1", "prompt", DOC, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GenflowError::AgentCallFailed(_)));
    }

    #[tokio::test]
    async fn test_unregistered_primary_uses_fallback() {
        let b = Arc::new(ScriptedProvider::new("provider-b").then_ok("fallback output"));
        let r = router(table_with_fallback(), vec![b.clone()], fast_health(), 1);

        let result = r
            .execute(1, "t1", "prompt", DOC, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.provider, "provider-b");
    }

    #[tokio::test]
    async fn test_open_primary_circuit_short_circuits_to_fallback() {
        let a = Arc::new(ScriptedProvider::new("provider-a"));
        let b = Arc::new(ScriptedProvider::new("provider-b").then_ok("fallback output"));
        let health = HealthRegistry::new(1, Duration::from_secs(60), Duration::from_secs(60));
        health.record_failure("provider-a");

        let r = router(table_with_fallback(), vec![a.clone(), b.clone()], health, 3);

        let result = r
            .execute(1, "t1", "prompt", DOC, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.provider, "provider-b");
        // Primary was never attempted while its circuit was open
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_propagates() {
        let a = Arc::new(ScriptedProvider::new("provider-a"));
        let r = router(table_with_fallback(), vec![a.clone()], fast_health(), 1);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = r.execute(1, "t1", "prompt", DOC, &cancel).await.unwrap_err();
        assert!(matches!(err, GenflowError::Cancelled(_)));
        assert_eq!(a.calls(), 0);
    }

    /// Provider that never answers; for cancellation tests
    struct StalledProvider {
        name: String,
    }

    #[async_trait::async_trait]
    impl Provider for StalledProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn execute(
            &self,
            _request: &GatewayRequest,
        ) -> std::result::Result<GatewayResponse, GatewayError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(GatewayError::Timeout)
        }
    }

    // Half-open in 80ms after one failure
    fn trial_health() -> HealthRegistry {
        HealthRegistry::new(1, Duration::from_secs(60), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_half_open_trial_success_closes_circuit() {
        let a = Arc::new(ScriptedProvider::new("provider-a").then_ok("recovered"));
        let health = trial_health();
        health.record_failure("provider-a");
        tokio::time::sleep(Duration::from_millis(80)).await;

        let r = router(table_with_fallback(), vec![a.clone()], health.clone(), 2);
        let result = r
            .execute(1, "t1", "prompt", DOC, &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.provider, "provider-a");
        assert_eq!(a.calls(), 1);
        assert_eq!(health.state("provider-a"), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_trial_failure_reopens_and_falls_back() {
        let a = Arc::new(
            ScriptedProvider::new("provider-a").then_err(GatewayError::Auth("denied".to_string())),
        );
        let b = Arc::new(ScriptedProvider::new("provider-b").then_ok("fallback output"));
        let health = trial_health();
        health.record_failure("provider-a");
        tokio::time::sleep(Duration::from_millis(80)).await;

        let r = router(table_with_fallback(), vec![a.clone(), b.clone()], health.clone(), 2);
        let result = r
            .execute(1, "t1", "prompt", DOC, &CancellationToken::new())
            .await
            .unwrap();

        // Exactly one trial against the primary, then the fallback
        assert!(result.success);
        assert_eq!(result.provider, "provider-b");
        assert_eq!(a.calls(), 1);
        assert_eq!(health.state("provider-a"), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_unregistered_primary_half_open_fallback_gets_its_trial() {
        // Primary unregistered, fallback half-open: the single trial
        // slot must reach the fallback provider instead of being
        // consumed by a pre-check.
        let b = Arc::new(ScriptedProvider::new("provider-b").then_ok("fallback output"));
        let health = trial_health();
        health.record_failure("provider-b");
        tokio::time::sleep(Duration::from_millis(80)).await;

        let r = router(table_with_fallback(), vec![b.clone()], health.clone(), 1);
        let result = r
            .execute(1, "t1", "prompt", DOC, &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.provider, "provider-b");
        assert_eq!(b.calls(), 1);
        assert_eq!(health.state("provider-b"), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_cancelled_trial_releases_the_slot() {
        let health = trial_health();
        health.record_failure("provider-a");
        tokio::time::sleep(Duration::from_millis(80)).await;

        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StalledProvider {
            name: "provider-a".to_string(),
        }));
        let r = TaskRouter::new(
            table_with_fallback(),
            Arc::new(registry),
            health.clone(),
            1,
            Duration::from_secs(3600),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = r.execute(1, "t1", "prompt", DOC, &cancel).await.unwrap_err();
        assert!(matches!(err, GenflowError::Cancelled(_)));

        // The abandoned trial did not leak: the slot is claimable again
        assert!(health.breaker("provider-a").can_execute());
    }

    #[tokio::test]
    async fn test_success_resets_breaker() {
        let a = Arc::new(
            ScriptedProvider::new("provider-a")
                .then_err(GatewayError::Network("blip".to_string()))
                .then_ok("recovered"),
        );
        let health = fast_health();
        let r = router(table_with_fallback(), vec![a.clone()], health.clone(), 2);

        let result = r
            .execute(1, "t1", "prompt", DOC, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(health.breaker("provider-a").failure_count(), 0);
    }
}
