//! Time abstraction for deterministic testing.
//!
//! Breakers and caches take a [`Clock`] so tests can drive state transitions
//! with [`MockClock::advance`] instead of sleeping.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Source of monotonic and wall-clock time.
pub trait Clock: Send + Sync + 'static {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// Current wall-clock time.
    fn system_time(&self) -> SystemTime;

    /// Milliseconds since the UNIX epoch.
    fn millis_since_epoch(&self) -> u64 {
        let millis =
            self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        u64::try_from(millis).unwrap_or(u64::MAX)
    }
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }
}

/// Manually advanced clock for tests.
///
/// Clones share the same elapsed counter, so a clock handed to a breaker or
/// cache can still be advanced from the test body.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Moves time forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Moves time forward by `millis` milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Sets the total elapsed time since creation.
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Total elapsed time since creation.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates the mock clock advance scenario.
    ///
    /// Assertions:
    /// - Confirms `now()` moves by exactly the advanced amount.
    /// - Confirms clones observe the same elapsed time.
    #[test]
    fn test_mock_clock_advance_is_shared() {
        let clock = MockClock::new();
        let t0 = clock.now();
        let handle = clock.clone();

        handle.advance_millis(250);
        clock.advance(Duration::from_millis(750));

        assert_eq!(clock.now().duration_since(t0), Duration::from_secs(1));
        assert_eq!(handle.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn test_mock_clock_set_elapsed_and_epoch_millis() {
        let clock = MockClock::new();
        clock.set_elapsed(Duration::from_millis(1234));
        assert_eq!(clock.millis_since_epoch(), 1234);
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
