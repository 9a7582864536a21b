//! Pass-through circuit breaker. Never opens, never rejects; used only to
//! satisfy the `CircuitBreaker` trait in tests or deliberately unprotected
//! services.

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::circuit_breaker::{
    CircuitBreaker, CircuitBreakerError, CircuitBreakerResult, CircuitBreakerState,
    CircuitBreakerStats,
};

#[derive(Debug)]
pub struct NoOpCircuitBreaker {
    total_calls: AtomicU64,
    successful_calls: AtomicU64,
    failed_calls: AtomicU64,
}

impl NoOpCircuitBreaker {
    pub fn new() -> Self {
        Self {
            total_calls: AtomicU64::new(0),
            successful_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
        }
    }
}

impl Default for NoOpCircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CircuitBreaker for NoOpCircuitBreaker {
    async fn execute<T, F, Fut>(&self, mut operation: F) -> CircuitBreakerResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, String>> + Send,
        T: Send,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        let outcome = operation().await;
        match &outcome {
            Ok(_) => {
                self.successful_calls.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.failed_calls.fetch_add(1, Ordering::Relaxed);
            }
        }
        CircuitBreakerResult {
            result: outcome.map_err(CircuitBreakerError::ServiceError),
            state: CircuitBreakerState::Closed,
            execution_time: start.elapsed(),
        }
    }

    async fn state(&self) -> CircuitBreakerState {
        CircuitBreakerState::Closed
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn force_open(&self) {}

    async fn force_closed(&self) {}

    async fn stats(&self) -> CircuitBreakerStats {
        let total = self.total_calls.load(Ordering::Relaxed);
        let failed = self.failed_calls.load(Ordering::Relaxed);
        CircuitBreakerStats {
            total_calls: total,
            successful_calls: self.successful_calls.load(Ordering::Relaxed),
            failed_calls: failed,
            state: CircuitBreakerState::Closed,
            failure_rate: if total == 0 { 0.0 } else { failed as f64 / total as f64 },
            last_state_change: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_available_even_after_failures() {
        let cb = NoOpCircuitBreaker::new();
        for _ in 0..10 {
            let _ = cb.execute(|| async { Err::<(), _>("boom".to_string()) }).await;
        }
        assert!(cb.is_available().await);
        assert_eq!(cb.state().await, CircuitBreakerState::Closed);
    }
}
