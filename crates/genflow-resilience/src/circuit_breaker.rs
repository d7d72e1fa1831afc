//! Circuit breaker for provider health protection
//!
//! Prevents repeated calls to a provider that keeps failing. The
//! breaker opens after a run of consecutive failures inside a sliding
//! window, stays open for a cooldown period, then admits exactly one
//! half-open trial call. The trial outcome decides whether the circuit
//! closes again or re-opens.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - requests allowed
    Closed,
    /// Too many failures - reject requests immediately
    Open,
    /// Cooldown elapsed - one trial request allowed
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    /// Start of the current failure streak
    streak_started: Option<Instant>,
    /// When the circuit last opened
    opened_at: Option<Instant>,
    /// Whether the single half-open trial slot has been claimed
    trial_claimed: bool,
}

/// Per-provider circuit breaker
///
/// All methods take `&self`; the state sits behind a mutex because
/// health tracking is process-wide and shared across sessions.
pub struct CircuitBreaker {
    threshold: u32,
    window: Duration,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    ///
    /// * `threshold` - consecutive failures before the circuit opens
    /// * `window` - failures only count as consecutive within this window
    /// * `cooldown` - time an open circuit waits before a half-open trial
    pub fn new(threshold: u32, window: Duration, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            window,
            cooldown,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                streak_started: None,
                opened_at: None,
                trial_claimed: false,
            }),
        }
    }

    fn refresh(inner: &mut Inner, cooldown: Duration) {
        if inner.state == CircuitState::Open {
            let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
            if elapsed >= cooldown {
                inner.state = CircuitState::HalfOpen;
                inner.trial_claimed = false;
            }
        }
    }

    /// Current circuit state
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock().unwrap();
        Self::refresh(&mut inner, self.cooldown);
        inner.state
    }

    /// Check whether a call may be issued right now
    ///
    /// In the half-open state this claims the single trial slot:
    /// the first caller gets `true`, every later caller gets `false`
    /// until the trial outcome is recorded.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        Self::refresh(&mut inner, self.cooldown);
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if inner.trial_claimed {
                    false
                } else {
                    inner.trial_claimed = true;
                    true
                }
            }
        }
    }

    /// Record a successful call; closes the circuit and resets the streak
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.streak_started = None;
        inner.opened_at = None;
        inner.trial_claimed = false;
    }

    /// Release a claimed half-open trial that produced no outcome
    ///
    /// Called when the trial is abandoned before the provider answered
    /// (e.g. cancellation), so the slot becomes claimable again instead
    /// of staying taken forever.
    pub fn release_trial(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == CircuitState::HalfOpen {
            inner.trial_claimed = false;
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        Self::refresh(&mut inner, self.cooldown);
        let now = Instant::now();

        match inner.state {
            CircuitState::HalfOpen => {
                // Trial failed - back to open, cooldown restarts
                inner.state = CircuitState::Open;
                inner.opened_at = Some(now);
                inner.trial_claimed = false;
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
            }
            CircuitState::Closed => {
                let streak_alive = inner
                    .streak_started
                    .map(|t| t.elapsed() <= self.window)
                    .unwrap_or(false);

                if streak_alive {
                    inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                } else {
                    inner.consecutive_failures = 1;
                    inner.streak_started = Some(now);
                }

                if inner.consecutive_failures >= self.threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                }
            }
            CircuitState::Open => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
            }
        }
    }

    /// Consecutive failure count (for monitoring)
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().unwrap().consecutive_failures
    }

    /// Time remaining until a trial is allowed; zero unless open
    pub fn time_until_trial(&self) -> Duration {
        let mut inner = self.inner.lock().unwrap();
        Self::refresh(&mut inner, self.cooldown);
        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                self.cooldown.saturating_sub(opened_at.elapsed())
            }
            _ => Duration::ZERO,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        // Conservative defaults: 3 failures within a minute, 60 second cooldown
        Self::new(3, Duration::from_secs(60), Duration::from_secs(60))
    }
}
