//! Error types used throughout the workspace

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vectorsync_common::error::{CircuitOpenError, ConfigError, TimeoutError};

/// Main error type for vectorsync
///
/// Every port and adapter returns this type, so breaker and timeout helpers
/// can raise their own failures into it while an adapter's original error
/// passes through untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum VectorSyncError {
    /// A remote call exceeded its wall-clock bound.
    #[error("Timeout: {operation} exceeded {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    /// Fast-fail from an open circuit breaker.
    #[error("Circuit open: retry in {retry_after_secs}s")]
    CircuitOpen { retry_after_secs: u64 },

    /// The source system rejected the credentials or session.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Single-flight rejection of a concurrent sync request.
    #[error("Sync already in progress")]
    SyncAlreadyInProgress,

    #[error("Network error: {0}")]
    Network(String),

    /// The remote system answered with an application-level error.
    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VectorSyncError {
    /// Whether retrying the same call later might succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::CircuitOpen { .. } | Self::Network(_))
    }

    /// Whether this is a credential or session rejection.
    pub const fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

impl From<CircuitOpenError> for VectorSyncError {
    fn from(err: CircuitOpenError) -> Self {
        Self::CircuitOpen { retry_after_secs: err.retry_after_secs }
    }
}

impl From<TimeoutError> for VectorSyncError {
    fn from(err: TimeoutError) -> Self {
        Self::Timeout {
            operation: err.operation,
            after_ms: u64::try_from(err.after.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl From<ConfigError> for VectorSyncError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VectorSyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failed: {err}"))
    }
}

/// Result type alias for vectorsync operations
pub type Result<T> = std::result::Result<T, VectorSyncError>;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_resilience_errors_convert() {
        let open: VectorSyncError = CircuitOpenError { retry_after_secs: 12 }.into();
        assert_eq!(open, VectorSyncError::CircuitOpen { retry_after_secs: 12 });
        assert!(open.is_transient());

        let timeout: VectorSyncError =
            TimeoutError::new("count", Duration::from_secs(30)).into();
        assert_eq!(timeout.to_string(), "Timeout: count exceeded 30000ms");
        assert!(timeout.is_transient());

        assert!(!VectorSyncError::Authentication("bad key".into()).is_transient());
        assert!(VectorSyncError::Authentication("bad key".into()).is_authentication());
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let json = serde_json::to_value(VectorSyncError::NotFound("lead 7".into()))
            .expect("serializable");
        assert_eq!(json, serde_json::json!({"type": "NotFound", "message": "lead 7"}));
        assert_eq!(VectorSyncError::SyncAlreadyInProgress.to_string(), "Sync already in progress");
    }
}
