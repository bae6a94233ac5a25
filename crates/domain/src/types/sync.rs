//! Sync state, results, progress and health types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which sync path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    Full,
    Incremental,
}

/// Pipeline phase reported to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Fetching,
    Embedding,
    Upserting,
}

impl SyncPhase {
    /// Share of one batch's progress completed once this phase finishes.
    pub const fn cumulative_weight(self) -> f64 {
        match self {
            Self::Fetching => 0.33,
            Self::Embedding => 0.66,
            Self::Upserting => 1.0,
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fetching => "fetching",
            Self::Embedding => "embedding",
            Self::Upserting => "upserting",
        })
    }
}

/// Progress event emitted at each phase boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub phase: SyncPhase,
    /// One-based batch index.
    pub current_batch: usize,
    pub total_batches: usize,
    pub records_processed: usize,
    pub total_records: usize,
    pub percent_complete: f64,
    pub elapsed_ms: u64,
}

/// Progress of a paginated bulk fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchProgress {
    pub fetched: usize,
    pub total: usize,
}

/// A batch that failed during embedding or upserting.
///
/// Recorded in [`SyncResult::errors`] through its `Display` form; never
/// raised as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    /// One-based batch index.
    pub batch: usize,
    pub total_batches: usize,
    pub records: usize,
    pub phase: SyncPhase,
    pub reason: String,
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch {}/{} ({} records) failed during {}: {}",
            self.batch, self.total_batches, self.records, self.phase, self.reason
        )
    }
}

/// Outcome of one full or incremental sync invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub kind: SyncKind,
    /// True only when no record failed.
    pub success: bool,
    pub records_synced: usize,
    pub records_failed: usize,
    pub records_deleted: usize,
    pub duration_ms: u64,
    /// Version observed when the sync finished.
    pub sync_version: u64,
    /// One entry per failed batch, or a single top-level fault.
    pub errors: Vec<String>,
}

impl SyncResult {
    /// Result for a sync that could not run at all.
    pub fn aborted(kind: SyncKind, sync_version: u64, duration_ms: u64, error: String) -> Self {
        Self {
            kind,
            success: false,
            records_synced: 0,
            records_failed: 0,
            records_deleted: 0,
            duration_ms,
            sync_version,
            errors: vec![error],
        }
    }
}

/// Snapshot of the orchestrator's sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SyncState {
    pub last_sync_time: Option<DateTime<Utc>>,
    pub sync_version: u64,
    pub is_syncing: bool,
}

/// Outcome of a single-record sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SingleSyncOutcome {
    /// The record's vector was written.
    Upserted { id: String },
    /// The record is archived or gone; its vector was removed.
    Deleted { id: String },
}

/// Vector store side of the health view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorStoreHealth {
    /// Breaker state name (`CLOSED`, `OPEN`, `HALF_OPEN`).
    pub breaker_state: String,
    /// Whether the breaker is rejecting calls.
    pub breaker_open: bool,
    pub seconds_until_retry: u64,
    pub reachable: bool,
}

/// Composite health view; computing it never starts a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub healthy: bool,
    pub embedding_available: bool,
    pub embedding_model: String,
    pub vector_store: VectorStoreHealth,
    pub state: SyncState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_failure_message_names_batch() {
        let failure = BatchFailure {
            batch: 2,
            total_batches: 3,
            records: 100,
            phase: SyncPhase::Embedding,
            reason: "Embedding error: quota".into(),
        };
        assert_eq!(
            failure.to_string(),
            "batch 2/3 (100 records) failed during embedding: Embedding error: quota"
        );
    }

    #[test]
    fn test_phase_weights_split_33_33_34() {
        let fetch = SyncPhase::Fetching.cumulative_weight();
        let embed = SyncPhase::Embedding.cumulative_weight() - fetch;
        let upsert = SyncPhase::Upserting.cumulative_weight() - SyncPhase::Embedding.cumulative_weight();
        assert!((fetch - 0.33).abs() < 1e-9);
        assert!((embed - 0.33).abs() < 1e-9);
        assert!((upsert - 0.34).abs() < 1e-9);
    }
}
