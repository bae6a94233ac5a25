//! Resilience primitives for remote calls.
//!
//! - [`CircuitBreaker`]: tri-state failure gate, one instance per endpoint
//! - [`with_timeout`]: wall-clock bound that raises [`TimeoutError`]
//! - [`Clock`]: time source, with [`MockClock`] for deterministic tests
//!
//! The usual composition puts the timeout inside the breaker so an expired
//! call counts as a failure:
//!
//! ```
//! use std::time::Duration;
//!
//! use vectorsync_common::error::{CircuitOpenError, TimeoutError};
//! use vectorsync_common::resilience::{with_timeout, CircuitBreaker, CircuitBreakerConfig};
//!
//! #[derive(Debug)]
//! enum AppError {
//!     Open(CircuitOpenError),
//!     Timeout(TimeoutError),
//! }
//! # impl std::fmt::Display for AppError {
//! #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{self:?}") }
//! # }
//! # impl From<CircuitOpenError> for AppError { fn from(e: CircuitOpenError) -> Self { Self::Open(e) } }
//! # impl From<TimeoutError> for AppError { fn from(e: TimeoutError) -> Self { Self::Timeout(e) } }
//!
//! # tokio_test::block_on(async {
//! let breaker = CircuitBreaker::new(CircuitBreakerConfig::default()).unwrap();
//! let value: Result<u32, AppError> = breaker
//!     .execute(|| with_timeout("lookup", Duration::from_secs(5), async { Ok(42) }))
//!     .await;
//! assert_eq!(value.unwrap(), 42);
//! # });
//! ```
//!
//! [`TimeoutError`]: crate::error::TimeoutError

pub mod circuit_breaker;
pub mod clock;
pub mod timeout;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerBuilderWithClock, CircuitBreakerConfig,
    CircuitBreakerConfigBuilder, CircuitBreakerMetrics, CircuitState,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use timeout::with_timeout;
