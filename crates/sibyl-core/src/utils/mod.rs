//! Reliability utilities: circuit breaker and retry

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{
    BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState,
};
pub use retry::{retry_with_backoff, RetryConfig, RetryError};
