//! Domain-free building blocks shared across vectorsync crates.
//!
//! # Feature Tiers
//!
//! - `foundation`: error types only ([`error`]), no runtime dependencies
//! - `runtime`: [`resilience`] (circuit breaker, timeouts, clocks) and
//!   [`cache`] (stale-while-revalidate LRU cache)
//! - `test-utils`: alias of `runtime` for dev-dependency use

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod cache;
#[cfg(feature = "runtime")]
pub mod resilience;

#[cfg(feature = "runtime")]
pub use cache::{CacheConfig, CacheStats, RefreshableCache};
#[cfg(feature = "foundation")]
pub use error::{CircuitOpenError, ConfigError, ConfigResult, TimeoutError};
#[cfg(feature = "runtime")]
pub use resilience::{
    with_timeout, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState,
    Clock, MockClock, SystemClock,
};
