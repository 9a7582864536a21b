//! Sliding consecutive-failure circuit breaker.
//!
//! Closed -> Open after `failure_threshold` consecutive failures. Open ->
//! HalfOpen once `reset_timeout` has elapsed. HalfOpen -> Closed after
//! `success_threshold` consecutive successes, or back to Open on any failure.

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use super::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerResult,
    CircuitBreakerState, CircuitBreakerStats,
};

struct Inner {
    state: CircuitBreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    last_state_change: Option<Instant>,
}

#[derive(Debug)]
pub struct SimpleCircuitBreaker {
    config: CircuitBreakerConfig,
    inner: RwLock<Inner>,
    total_calls: AtomicU64,
    successful_calls: AtomicU64,
    failed_calls: AtomicU64,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner")
            .field("state", &self.state)
            .field("consecutive_failures", &self.consecutive_failures)
            .field("consecutive_successes", &self.consecutive_successes)
            .finish()
    }
}

impl SimpleCircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner {
                state: CircuitBreakerState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                last_state_change: None,
            }),
            total_calls: AtomicU64::new(0),
            successful_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
        }
    }

    /// Moves Open -> HalfOpen once the reset timeout has elapsed. Returns the
    /// state to evaluate the call against.
    async fn admit(&self) -> CircuitBreakerState {
        let mut inner = self.inner.write().await;
        if inner.state == CircuitBreakerState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= self.config.reset_timeout {
                    inner.state = CircuitBreakerState::HalfOpen;
                    inner.consecutive_successes = 0;
                    inner.last_state_change = Some(Instant::now());
                    debug!("circuit breaker transitioning Open -> HalfOpen");
                }
            }
        }
        inner.state
    }

    async fn record_success(&self) {
        self.successful_calls.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.write().await;
        inner.consecutive_failures = 0;
        match inner.state {
            CircuitBreakerState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.state = CircuitBreakerState::Closed;
                    inner.opened_at = None;
                    inner.last_state_change = Some(Instant::now());
                    debug!("circuit breaker transitioning HalfOpen -> Closed");
                }
            }
            CircuitBreakerState::Open => {}
            CircuitBreakerState::Closed => {}
        }
    }

    async fn record_failure(&self) {
        self.failed_calls.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.write().await;
        match inner.state {
            CircuitBreakerState::HalfOpen => {
                inner.state = CircuitBreakerState::Open;
                inner.consecutive_failures = 0;
                inner.opened_at = Some(Instant::now());
                inner.last_state_change = Some(Instant::now());
                debug!("circuit breaker transitioning HalfOpen -> Open");
            }
            CircuitBreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitBreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.last_state_change = Some(Instant::now());
                    debug!("circuit breaker transitioning Closed -> Open");
                }
            }
            CircuitBreakerState::Open => {}
        }
    }
}

#[async_trait]
impl CircuitBreaker for SimpleCircuitBreaker {
    async fn execute<T, F, Fut>(&self, mut operation: F) -> CircuitBreakerResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, String>> + Send,
        T: Send,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        if self.admit().await == CircuitBreakerState::Open {
            return CircuitBreakerResult {
                result: Err(CircuitBreakerError::CircuitOpen),
                state: CircuitBreakerState::Open,
                execution_time: start.elapsed(),
            };
        }

        let outcome = match tokio::time::timeout(self.config.timeout, operation()).await {
            Ok(Ok(value)) => {
                self.record_success().await;
                Ok(value)
            }
            Ok(Err(message)) => {
                self.record_failure().await;
                Err(CircuitBreakerError::ServiceError(message))
            }
            Err(_) => {
                self.record_failure().await;
                Err(CircuitBreakerError::Timeout)
            }
        };

        CircuitBreakerResult {
            result: outcome,
            state: self.state().await,
            execution_time: start.elapsed(),
        }
    }

    async fn state(&self) -> CircuitBreakerState {
        self.inner.read().await.state
    }

    async fn is_available(&self) -> bool {
        self.state().await != CircuitBreakerState::Open
    }

    async fn force_open(&self) {
        let mut inner = self.inner.write().await;
        inner.state = CircuitBreakerState::Open;
        inner.opened_at = Some(Instant::now());
        inner.last_state_change = Some(Instant::now());
    }

    async fn force_closed(&self) {
        let mut inner = self.inner.write().await;
        inner.state = CircuitBreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.last_state_change = Some(Instant::now());
    }

    async fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.read().await;
        let total = self.total_calls.load(Ordering::Relaxed);
        let failed = self.failed_calls.load(Ordering::Relaxed);
        CircuitBreakerStats {
            total_calls: total,
            successful_calls: self.successful_calls.load(Ordering::Relaxed),
            failed_calls: failed,
            state: inner.state,
            failure_rate: if total == 0 { 0.0 } else { failed as f64 / total as f64 },
            last_state_change: inner.last_state_change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            timeout: Duration::from_millis(200),
            reset_timeout: Duration::from_millis(50),
            success_threshold: 1,
        }
    }

    #[tokio::test]
    async fn opens_after_consecutive_failures() {
        let cb = SimpleCircuitBreaker::new(config());
        for _ in 0..2 {
            let r = cb.execute(|| async { Err::<(), _>("boom".to_string()) }).await;
            assert!(r.result.is_err());
        }
        assert_eq!(cb.state().await, CircuitBreakerState::Open);
        assert!(!cb.is_available().await);
    }

    #[tokio::test]
    async fn half_open_recovers_to_closed() {
        let cb = SimpleCircuitBreaker::new(config());
        cb.force_open().await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        let r = cb.execute(|| async { Ok::<_, String>(42) }).await;
        assert!(r.result.is_ok());
        assert_eq!(cb.state().await, CircuitBreakerState::Closed);
    }

    #[tokio::test]
    async fn open_rejects_without_calling_operation() {
        let cb = SimpleCircuitBreaker::new(config());
        cb.force_open().await;
        let r = cb.execute(|| async { Ok::<_, String>(1) }).await;
        assert!(matches!(r.result, Err(CircuitBreakerError::CircuitOpen)));
    }
}
