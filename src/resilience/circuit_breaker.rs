//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast
//! - HalfOpen: testing if the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures within the rolling window reach the threshold
//! Open → HalfOpen: after the open cooldown elapses
//! HalfOpen → Closed: the single probe succeeds (failure window cleared)
//! HalfOpen → Open: the probe fails (fresh cooldown)
//! ```
//!
//! # Design Decisions
//! - Per-endpoint breaker (not global), owned by the endpoint registry
//! - Fail fast in Open state, with a retry-after hint for the caller
//! - Exactly one probe in HalfOpen; concurrent calls are rejected
//! - 4xx responses prove the upstream is alive and do not count as failures

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::schema::CircuitBreakerConfig;
use crate::error::{GatewayError, GatewayResult};

/// Circuit breaker state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge value for the metrics sink (0=Closed, 1=Open, 2=HalfOpen).
    pub fn as_metric_value(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

/// Read-only diagnostic snapshot of one breaker.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitStatus {
    pub endpoint: String,
    pub state: CircuitState,
    /// Failures currently inside the rolling window.
    pub failure_count: u32,
    /// Milliseconds until the next probe is admitted, when Open.
    pub retry_after_ms: Option<u64>,
}

struct BreakerState {
    state: CircuitState,
    /// Timestamps of failures inside the rolling window.
    failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Per-endpoint circuit breaker.
pub struct CircuitBreaker {
    endpoint: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(endpoint: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    fn window(&self) -> Duration {
        Duration::from_millis(self.config.window_ms)
    }

    fn cooldown(&self) -> Duration {
        Duration::from_millis(self.config.open_cooldown_ms)
    }

    fn prune_window(&self, state: &mut BreakerState, now: Instant) {
        let cutoff = now.checked_sub(self.window());
        if let Some(cutoff) = cutoff {
            while state.failures.front().is_some_and(|t| *t < cutoff) {
                state.failures.pop_front();
            }
        }
    }

    /// Gate a call. `Ok(())` admits it (Closed, or the single HalfOpen
    /// probe); otherwise fails fast with `CircuitOpen`.
    pub fn check(&self) -> GatewayResult<()> {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        let now = Instant::now();

        match state.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = state.opened_at.map(|t| now.duration_since(t));
                if elapsed.is_some_and(|e| e >= self.cooldown()) {
                    state.state = CircuitState::HalfOpen;
                    state.probe_in_flight = true;
                    tracing::info!(endpoint = %self.endpoint, "Circuit transitioning to half-open");
                    Ok(())
                } else {
                    let remaining = self
                        .cooldown()
                        .saturating_sub(elapsed.unwrap_or_default());
                    Err(GatewayError::CircuitOpen {
                        endpoint: self.endpoint.clone(),
                        retry_after_ms: remaining.as_millis() as u64,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if state.probe_in_flight {
                    Err(GatewayError::CircuitOpen {
                        endpoint: self.endpoint.clone(),
                        retry_after_ms: self.config.open_cooldown_ms,
                    })
                } else {
                    state.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a successful call. Clears the failure window; a successful
    /// half-open probe closes the circuit.
    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        state.failures.clear();

        if state.state != CircuitState::Closed {
            tracing::info!(endpoint = %self.endpoint, "Circuit closed, upstream recovered");
        }
        state.state = CircuitState::Closed;
        state.opened_at = None;
        state.probe_in_flight = false;
    }

    /// Record a failed call that counts toward the threshold.
    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        let now = Instant::now();
        state.failures.push_back(now);
        self.prune_window(&mut state, now);

        match state.state {
            CircuitState::Closed => {
                if state.failures.len() as u32 >= self.config.failure_threshold {
                    state.state = CircuitState::Open;
                    state.opened_at = Some(now);
                    tracing::warn!(
                        endpoint = %self.endpoint,
                        failures = state.failures.len(),
                        window_ms = self.config.window_ms,
                        "Circuit opened, too many failures"
                    );
                }
            }
            CircuitState::HalfOpen => {
                state.state = CircuitState::Open;
                state.opened_at = Some(now);
                state.probe_in_flight = false;
                tracing::warn!(endpoint = %self.endpoint, "Circuit re-opened, probe failed");
            }
            CircuitState::Open => {
                // Already open; the failure only extends the window.
            }
        }
    }

    pub fn current_state(&self) -> CircuitState {
        self.state.lock().expect("circuit breaker mutex poisoned").state
    }

    /// Diagnostic snapshot for the admin surface.
    pub fn snapshot(&self) -> CircuitStatus {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        let now = Instant::now();
        self.prune_window(&mut state, now);

        let retry_after_ms = match state.state {
            CircuitState::Open => {
                let elapsed = state.opened_at.map(|t| now.duration_since(t)).unwrap_or_default();
                Some(self.cooldown().saturating_sub(elapsed).as_millis() as u64)
            }
            _ => None,
        };

        CircuitStatus {
            endpoint: self.endpoint.clone(),
            state: state.state,
            failure_count: state.failures.len() as u32,
            retry_after_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "moi",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                window_ms: 60_000,
                open_cooldown_ms: cooldown_ms,
            },
        )
    }

    #[test]
    fn test_starts_closed() {
        let cb = breaker(3, 1000);
        assert_eq!(cb.current_state(), CircuitState::Closed);
        assert!(cb.check().is_ok());
    }

    #[test]
    fn test_opens_at_threshold() {
        let cb = breaker(3, 1000);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.current_state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.current_state(), CircuitState::Open);
    }

    #[test]
    fn test_open_fails_fast_with_hint() {
        let cb = breaker(1, 60_000);
        cb.record_failure();

        match cb.check().unwrap_err() {
            GatewayError::CircuitOpen { retry_after_ms, .. } => {
                assert!(retry_after_ms > 0 && retry_after_ms <= 60_000);
            }
            other => panic!("expected CircuitOpen, got {other}"),
        }
    }

    #[test]
    fn test_success_resets_failure_window() {
        let cb = breaker(3, 1000);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.snapshot().failure_count, 0);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.current_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_admits_single_probe() {
        let cb = breaker(1, 10);
        cb.record_failure();
        assert_eq!(cb.current_state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;

        // First caller becomes the probe; the second is rejected.
        assert!(cb.check().is_ok());
        assert_eq!(cb.current_state(), CircuitState::HalfOpen);
        assert!(matches!(cb.check(), Err(GatewayError::CircuitOpen { .. })));
    }

    #[tokio::test]
    async fn test_probe_success_closes() {
        let cb = breaker(1, 10);
        cb.record_failure();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cb.check().is_ok());
        cb.record_success();
        assert_eq!(cb.current_state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 0);
        assert!(cb.check().is_ok());
    }

    #[tokio::test]
    async fn test_probe_failure_reopens() {
        let cb = breaker(1, 10);
        cb.record_failure();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cb.check().is_ok());
        cb.record_failure();
        assert_eq!(cb.current_state(), CircuitState::Open);

        // Fresh cooldown: immediately after re-opening, calls are rejected.
        assert!(matches!(cb.check(), Err(GatewayError::CircuitOpen { .. })));
    }

    #[test]
    fn test_window_prunes_old_failures() {
        let cb = CircuitBreaker::new(
            "moi",
            CircuitBreakerConfig {
                failure_threshold: 3,
                window_ms: 1, // everything expires almost immediately
                open_cooldown_ms: 1000,
            },
        );
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        cb.record_failure();

        // Each failure fell out of the window before the next arrived.
        assert_eq!(cb.current_state(), CircuitState::Closed);
    }
}
