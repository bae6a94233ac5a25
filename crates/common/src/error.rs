//! Error types shared by the resilience and cache primitives.
//!
//! These live in the foundation tier so that crates which only need to
//! *convert* resilience failures (for example a domain error enum) can do so
//! without pulling in the async runtime.

use std::time::Duration;

use thiserror::Error;

/// Raised by [`CircuitBreaker::execute`](crate::resilience::CircuitBreaker)
/// when the breaker is open and the operation was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("circuit breaker is open; retry in {retry_after_secs}s")]
pub struct CircuitOpenError {
    /// Estimated whole seconds until the breaker admits a probe call.
    pub retry_after_secs: u64,
}

/// Raised when a remote call does not settle within its time bound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} timed out after {}ms", after.as_millis())]
pub struct TimeoutError {
    /// Short name of the operation that was bounded.
    pub operation: String,
    /// The bound that was exceeded.
    pub after: Duration,
}

impl TimeoutError {
    /// Builds a timeout error for `operation`.
    pub fn new(operation: impl Into<String>, after: Duration) -> Self {
        Self { operation: operation.into(), after }
    }
}

/// Builder validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A configuration value is out of range.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// Human readable reason.
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }
}

/// Configuration result type used by builders.
pub type ConfigResult<T> = Result<T, ConfigError>;
