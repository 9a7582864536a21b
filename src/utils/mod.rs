//! Small reusable utilities shared across the crate.

pub mod circuit_breaker;
pub mod circuit_breaker_noop;
pub mod circuit_breaker_simple;

pub use circuit_breaker::{
    create_circuit_breaker, create_circuit_breaker_for_service, create_circuit_breaker_from_profile,
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerResult,
    CircuitBreakerState, CircuitBreakerStats, CircuitBreakerType, ConcreteCircuitBreaker,
};
