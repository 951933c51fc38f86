//! Failure isolation for outbound calls.

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{BreakerConfig, CircuitBreaker, CircuitBreakerState, CircuitState};
pub use retry::RetryPolicy;
