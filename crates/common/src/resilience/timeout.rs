//! Wall-clock bounds for remote calls.
//!
//! A timeout here means "stop waiting", not "cancel the request": the
//! awaited future is dropped, which abandons the response but does not reach
//! into the transport to abort bytes already in flight.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::TimeoutError;

/// Awaits `future` for at most `limit`.
///
/// On expiry a [`TimeoutError`] naming `operation` is raised into the
/// caller's error type. Run this inside
/// [`CircuitBreaker::execute`](super::CircuitBreaker::execute) so the expiry
/// is recorded as a breaker failure.
pub async fn with_timeout<F, T, E>(operation: &str, limit: Duration, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<TimeoutError>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, timeout_ms = limit.as_millis(), "remote call timed out");
            Err(E::from(TimeoutError::new(operation, limit)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    enum TestError {
        TimedOut(String),
        Remote,
    }

    impl From<TimeoutError> for TestError {
        fn from(err: TimeoutError) -> Self {
            Self::TimedOut(err.operation)
        }
    }

    #[tokio::test]
    async fn test_completes_within_bound() {
        let result: Result<u8, TestError> =
            with_timeout("fast", Duration::from_secs(1), async { Ok(1) }).await;
        assert_eq!(result, Ok(1));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<u8, TestError> =
            with_timeout("fast", Duration::from_secs(1), async { Err(TestError::Remote) }).await;
        assert_eq!(result, Err(TestError::Remote));
    }

    #[tokio::test]
    async fn test_expiry_raises_timeout_error() {
        let result: Result<u8, TestError> = with_timeout("slow", Duration::from_millis(20), async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(1)
        })
        .await;
        assert_eq!(result, Err(TestError::TimedOut("slow".to_string())));
    }
}
