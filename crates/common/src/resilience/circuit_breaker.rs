//! Tri-state circuit breaker guarding a single remote endpoint.
//!
//! # State machine
//!
//! ```text
//!            failures >= threshold
//!   CLOSED ─────────────────────────▶ OPEN
//!     ▲                                │  now - last_failure >= reset_timeout
//!     │ probe succeeds                 ▼  (evaluated lazily on query)
//!     └──────────────────────────── HALF_OPEN
//!                                      │ probe fails
//!                                      └──────────▶ OPEN (fresh last_failure)
//! ```
//!
//! The OPEN → HALF_OPEN edge has no timer behind it. It is taken the next
//! time anything asks the breaker for its state, which keeps the breaker
//! free of background tasks. While HALF_OPEN exactly one probe call is in
//! flight; other callers are rejected with a zero retry estimate until the
//! probe settles.
//!
//! The breaker never rewrites the error of the operation it wraps. A failed
//! operation is counted and its error handed back as-is; the only error the
//! breaker produces itself is [`CircuitOpenError`], converted into the
//! caller's error type through `From`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use crate::error::{CircuitOpenError, ConfigError, ConfigResult};

//==============================================================================
// State & Configuration
//==============================================================================

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow through; consecutive failures are counted.
    Closed,
    /// Calls are rejected without being attempted.
    Open,
    /// One recovery probe is admitted.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a probe is admitted.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout: Duration::from_secs(60) }
    }
}

impl CircuitBreakerConfig {
    /// Creates a configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold must be greater than 0"));
        }
        if self.reset_timeout.is_zero() {
            return Err(ConfigError::invalid("reset_timeout must be greater than 0"));
        }
        Ok(())
    }
}

/// Builder for [`CircuitBreakerConfig`].
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    /// Starts from the default configuration.
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    /// Sets the consecutive-failure threshold.
    #[must_use]
    pub const fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Sets the open-state duration.
    #[must_use]
    pub const fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.config.reset_timeout = timeout;
        self
    }

    /// Switches to a builder that produces a breaker driven by `clock`.
    pub fn clock<C: Clock>(self, clock: C) -> CircuitBreakerBuilderWithClock<C> {
        CircuitBreakerBuilderWithClock { config: self.config, clock, name: None }
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Builder that produces a [`CircuitBreaker`] with a custom clock.
#[derive(Debug)]
pub struct CircuitBreakerBuilderWithClock<C: Clock> {
    config: CircuitBreakerConfig,
    clock: C,
    name: Option<String>,
}

impl<C: Clock> CircuitBreakerBuilderWithClock<C> {
    /// Sets the consecutive-failure threshold.
    #[must_use]
    pub const fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Sets the open-state duration.
    #[must_use]
    pub const fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.config.reset_timeout = timeout;
        self
    }

    /// Names the breaker for log output.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the breaker.
    pub fn build(self) -> ConfigResult<CircuitBreaker<C>> {
        let breaker = CircuitBreaker::with_clock(self.config, self.clock)?;
        Ok(match self.name {
            Some(name) => breaker.named(name),
            None => breaker,
        })
    }
}

//==============================================================================
// Metrics
//==============================================================================

/// Point-in-time view of a breaker for health endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerMetrics {
    /// State after applying the lazy OPEN → HALF_OPEN transition.
    pub state: CircuitState,
    /// Current run of consecutive failures.
    pub consecutive_failures: u32,
    /// Whole seconds until a probe is admitted; zero unless OPEN.
    pub seconds_until_retry: u64,
    /// Calls admitted through the gate.
    pub total_calls: u64,
    /// Calls rejected while OPEN or behind a running probe.
    pub rejected_calls: u64,
    /// Time since the most recent recorded failure.
    pub last_failure_age: Option<Duration>,
    /// Time spent in the current state.
    pub time_in_state: Duration,
}

//==============================================================================
// Circuit Breaker
//==============================================================================

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_time: Option<Instant>,
    last_state_change: Instant,
    total_calls: u64,
    rejected_calls: u64,
    probe_in_flight: bool,
}

/// Circuit breaker over an async remote call.
///
/// Cloning is cheap and clones share state, so one breaker per endpoint can
/// be handed to every client that talks to that endpoint.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<BreakerState>>,
    clock: Arc<C>,
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            config: self.config.clone(),
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &guard.state)
            .field("consecutive_failures", &guard.consecutive_failures)
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Creates a breaker on the system clock.
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }

    /// Starts a configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Creates a breaker driven by `clock`.
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        let now = clock.now();
        Ok(Self {
            name: Arc::from("default"),
            config,
            inner: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_time: None,
                last_state_change: now,
                total_calls: 0,
                rejected_calls: 0,
                probe_in_flight: false,
            })),
            clock: Arc::new(clock),
        })
    }

    /// Renames the breaker for log output.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Arc::from(name.into());
        self
    }

    /// Name used in log output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Active configuration.
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Runs `operation` through the gate.
    ///
    /// When the circuit resolves to OPEN the operation is not invoked and a
    /// [`CircuitOpenError`] is returned through `E::from`. Otherwise the
    /// outcome is recorded and returned unchanged.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpenError> + fmt::Display,
    {
        let probe = ProbeGuard { breaker: self, armed: self.try_acquire().map_err(E::from)? };

        let outcome = operation().await;
        probe.disarm();
        match outcome {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                debug!(breaker = %self.name, error = %error, "protected call failed");
                self.record_failure();
                Err(error)
            }
        }
    }

    /// Admits or rejects one call, counting it either way.
    ///
    /// Returns `true` when the admitted call is the HALF_OPEN probe; the
    /// caller must then report its outcome through [`record_success`] or
    /// [`record_failure`], or no further probe is admitted.
    ///
    /// [`record_success`]: Self::record_success
    /// [`record_failure`]: Self::record_failure
    pub fn try_acquire(&self) -> Result<bool, CircuitOpenError> {
        let now = self.clock.now();
        let mut guard = self.inner.lock();
        match self.resolve(&mut guard, now) {
            CircuitState::Open => {
                guard.rejected_calls += 1;
                let retry_after_secs = self.retry_after_secs(&guard, now);
                debug!(breaker = %self.name, retry_after_secs, "rejecting call, circuit open");
                Err(CircuitOpenError { retry_after_secs })
            }
            CircuitState::HalfOpen if guard.probe_in_flight => {
                guard.rejected_calls += 1;
                debug!(breaker = %self.name, "rejecting call, probe in flight");
                Err(CircuitOpenError { retry_after_secs: 0 })
            }
            CircuitState::HalfOpen => {
                guard.total_calls += 1;
                guard.probe_in_flight = true;
                Ok(true)
            }
            CircuitState::Closed => {
                guard.total_calls += 1;
                Ok(false)
            }
        }
    }

    /// Whether a call made now would be admitted.
    pub fn is_call_permitted(&self) -> bool {
        let now = self.clock.now();
        let mut guard = self.inner.lock();
        match self.resolve(&mut guard, now) {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => !guard.probe_in_flight,
            CircuitState::Open => false,
        }
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        let now = self.clock.now();
        let mut guard = self.inner.lock();
        guard.probe_in_flight = false;
        match guard.state {
            CircuitState::Closed => guard.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                guard.state = CircuitState::Closed;
                guard.consecutive_failures = 0;
                guard.last_state_change = now;
                info!(breaker = %self.name, "circuit closed after successful probe");
            }
            CircuitState::Open => {
                debug!(breaker = %self.name, "success from a call admitted before the circuit opened");
            }
        }
    }

    /// Records a failed call.
    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut guard = self.inner.lock();
        guard.probe_in_flight = false;
        guard.consecutive_failures = guard.consecutive_failures.saturating_add(1);

        match guard.state {
            CircuitState::Closed => {
                guard.last_failure_time = Some(now);
                if guard.consecutive_failures >= self.config.failure_threshold {
                    guard.state = CircuitState::Open;
                    guard.last_state_change = now;
                    warn!(
                        breaker = %self.name,
                        failures = guard.consecutive_failures,
                        reset_timeout_ms = self.config.reset_timeout.as_millis(),
                        "circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                guard.state = CircuitState::Open;
                guard.last_failure_time = Some(now);
                guard.last_state_change = now;
                warn!(breaker = %self.name, "probe failed, circuit re-opened");
            }
            // Stragglers admitted before the circuit opened must not push the
            // retry window further out.
            CircuitState::Open => {}
        }
    }

    /// Current state, applying the lazy OPEN → HALF_OPEN transition.
    pub fn state(&self) -> CircuitState {
        let now = self.clock.now();
        let mut guard = self.inner.lock();
        self.resolve(&mut guard, now)
    }

    /// Snapshot for observability. Never touches the failure count.
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let now = self.clock.now();
        let mut guard = self.inner.lock();
        let state = self.resolve(&mut guard, now);
        CircuitBreakerMetrics {
            state,
            consecutive_failures: guard.consecutive_failures,
            seconds_until_retry: if state == CircuitState::Open {
                self.retry_after_secs(&guard, now)
            } else {
                0
            },
            total_calls: guard.total_calls,
            rejected_calls: guard.rejected_calls,
            last_failure_age: guard.last_failure_time.map(|t| now.saturating_duration_since(t)),
            time_in_state: now.saturating_duration_since(guard.last_state_change),
        }
    }

    /// Forces the breaker back to CLOSED with a clean failure count.
    pub fn reset(&self) {
        let now = self.clock.now();
        let mut guard = self.inner.lock();
        guard.state = CircuitState::Closed;
        guard.consecutive_failures = 0;
        guard.last_failure_time = None;
        guard.last_state_change = now;
        guard.probe_in_flight = false;
        info!(breaker = %self.name, "circuit manually reset");
    }

    fn resolve(&self, guard: &mut BreakerState, now: Instant) -> CircuitState {
        if guard.state == CircuitState::Open {
            let elapsed = guard
                .last_failure_time
                .map_or(self.config.reset_timeout, |t| now.saturating_duration_since(t));
            if elapsed >= self.config.reset_timeout {
                guard.state = CircuitState::HalfOpen;
                guard.last_state_change = now;
                info!(breaker = %self.name, "circuit half-open, admitting probe");
            }
        }
        guard.state
    }

    fn retry_after_secs(&self, guard: &BreakerState, now: Instant) -> u64 {
        let elapsed = guard.last_failure_time.map_or(Duration::ZERO, |t| now.saturating_duration_since(t));
        let remaining = self.config.reset_timeout.saturating_sub(elapsed);
        remaining.as_millis().div_ceil(1000).try_into().unwrap_or(u64::MAX)
    }
}

/// Frees the probe slot if a probe's future is dropped before it settles.
struct ProbeGuard<'a, C: Clock> {
    breaker: &'a CircuitBreaker<C>,
    armed: bool,
}

impl<C: Clock> ProbeGuard<'_, C> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<C: Clock> Drop for ProbeGuard<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.inner.lock().probe_in_flight = false;
            debug!(breaker = %self.breaker.name, "probe abandoned before completion");
        }
    }
}
