//! Process-wide provider health registry
//!
//! One circuit breaker per provider, shared by every router instance
//! in the process. Explicitly owned and injectable so tests can use a
//! fresh registry per case instead of ambient global state.

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use genflow_core::{CircuitConfig, ProviderId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared map of provider identifier to circuit breaker
///
/// Cloning is cheap and shares the underlying state.
#[derive(Clone)]
pub struct HealthRegistry {
    threshold: u32,
    window: Duration,
    cooldown: Duration,
    breakers: Arc<Mutex<HashMap<ProviderId, Arc<CircuitBreaker>>>>,
}

impl HealthRegistry {
    pub fn new(threshold: u32, window: Duration, cooldown: Duration) -> Self {
        Self {
            threshold,
            window,
            cooldown,
            breakers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &CircuitConfig) -> Self {
        Self::new(
            config.failure_threshold,
            Duration::from_secs(config.window_seconds),
            Duration::from_secs(config.cooldown_seconds),
        )
    }

    /// Breaker for a provider, created closed on first use
    pub fn breaker(&self, provider: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap();
        breakers
            .entry(provider.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(self.threshold, self.window, self.cooldown))
            })
            .clone()
    }

    /// Circuit state for a provider; `Closed` for providers never seen
    pub fn state(&self, provider: &str) -> CircuitState {
        self.breaker(provider).state()
    }

    pub fn record_success(&self, provider: &str) {
        self.breaker(provider).record_success();
    }

    pub fn record_failure(&self, provider: &str) {
        let breaker = self.breaker(provider);
        breaker.record_failure();
        tracing::debug!(
            provider = %provider,
            failures = breaker.failure_count(),
            state = %breaker.state(),
            "Recorded provider failure"
        );
    }

    /// Snapshot of every tracked provider, for status reporting
    pub fn snapshot(&self) -> Vec<(ProviderId, CircuitState, u32)> {
        let breakers = self.breakers.lock().unwrap();
        let mut rows: Vec<_> = breakers
            .iter()
            .map(|(id, b)| (id.clone(), b.state(), b.failure_count()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::from_config(&CircuitConfig::default())
    }
}
