//! Sync pipeline: source records → embedding text → vectors → vector store.
//!
//! # Architecture
//!
//! ```text
//!   RecordSource ──fetch batch──▶ build_embedding_text ──▶ EmbeddingProvider
//!                                                              │
//!   VectorSink ◀──────upsert batch────── build_vector_record ◀─┘
//! ```
//!
//! Batches run strictly one after another. A batch that fails to fetch,
//! embed or upsert is recorded as a [`BatchFailure`] and the run moves on to
//! the next batch; only a failure before the first batch (collection setup,
//! counting, change detection) aborts the run.
//!
//! # Single flight
//!
//! `full_sync` and `incremental_sync` share one gate. A call that finds the
//! gate taken returns a rejected result straight away and touches no state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use tracing::{error, info, instrument, warn};
use vectorsync_domain::{
    BatchFailure, IncrementalFallback, InputType, RecordFilter, Result, SingleSyncOutcome,
    SourceRecord, SyncConfig, SyncKind, SyncPhase, SyncResult, SyncState, SyncStatus,
    VectorRecord, VectorSyncError,
};

use super::document::{build_embedding_text, build_vector_record};
use super::progress::{ProgressCallback, ProgressTracker};
use crate::embedding::EmbeddingProvider;
use crate::source::RecordSource;
use crate::vector::VectorSink;

#[derive(Debug, Default)]
struct VersionState {
    last_sync_time: Option<DateTime<Utc>>,
    sync_version: u64,
}

/// Clears the single-flight flag when a sync run ends, however it ends.
struct SyncGate<'a> {
    flag: &'a AtomicBool,
}

impl Drop for SyncGate<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Counters accumulated over one run.
struct RunTally {
    kind: SyncKind,
    started: Instant,
    started_at: DateTime<Utc>,
    total_batches: usize,
    /// Version stamped into payloads written by this run.
    target_version: u64,
    synced: usize,
    failed: usize,
    deleted: usize,
    errors: Vec<String>,
}

impl RunTally {
    fn fail(&mut self, batch_index: usize, records: usize, phase: SyncPhase, err: &VectorSyncError) {
        let failure = BatchFailure {
            batch: batch_index + 1,
            total_batches: self.total_batches,
            records,
            phase,
            reason: err.to_string(),
        };
        error!(
            kind = ?self.kind,
            batch = failure.batch,
            records,
            phase = %phase,
            error = %err,
            "batch failed, continuing with next batch"
        );
        self.failed += records;
        self.errors.push(failure.to_string());
    }

    fn processed(&self) -> usize {
        self.synced + self.failed + self.deleted
    }
}

/// Drives full, incremental and single-record syncs.
///
/// Each orchestrator owns its own sync state, so independent instances (for
/// example in tests) never observe each other.
pub struct SyncOrchestrator {
    source: Arc<dyn RecordSource>,
    embedder: Arc<dyn EmbeddingProvider>,
    sink: Arc<dyn VectorSink>,
    config: SyncConfig,
    syncing: AtomicBool,
    state: Mutex<VersionState>,
}

impl SyncOrchestrator {
    /// Create a new orchestrator
    pub fn new(
        source: Arc<dyn RecordSource>,
        embedder: Arc<dyn EmbeddingProvider>,
        sink: Arc<dyn VectorSink>,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            embedder,
            sink,
            config: SyncConfig { batch_size: config.batch_size.max(1), ..config },
            syncing: AtomicBool::new(false),
            state: Mutex::new(VersionState::default()),
        }
    }

    /// Seeds the bookkeeping, e.g. from a persisted previous run.
    #[must_use]
    pub fn with_state(self, last_sync_time: Option<DateTime<Utc>>, sync_version: u64) -> Self {
        *self.state.lock() = VersionState { last_sync_time, sync_version };
        self
    }

    /// Current sync bookkeeping.
    pub fn state(&self) -> SyncState {
        let state = self.state.lock();
        SyncState {
            last_sync_time: state.last_sync_time,
            sync_version: state.sync_version,
            is_syncing: self.syncing.load(Ordering::Acquire),
        }
    }

    //==========================================================================
    // Full sync
    //==========================================================================

    /// Re-index every record in fixed-size batches.
    #[instrument(skip(self, progress), fields(batch_size = self.config.batch_size))]
    pub async fn full_sync(&self, progress: Option<ProgressCallback<'_>>) -> SyncResult {
        let started = Instant::now();
        let Some(_gate) = self.try_begin() else {
            return self.rejected(SyncKind::Full, started);
        };
        info!("full sync started");

        if let Err(err) = self.sink.ensure_collection(self.embedder.dimensions()).await {
            return self.abort(SyncKind::Full, started, "could not ensure collection", &err);
        }
        let filter = RecordFilter::All;
        let total = match self.source.count_records(&filter).await {
            Ok(total) => total,
            Err(err) => return self.abort(SyncKind::Full, started, "could not count records", &err),
        };

        let batch_size = self.config.batch_size;
        let mut tally = self.tally(SyncKind::Full, started, total.div_ceil(batch_size));
        let tracker = ProgressTracker::new(progress, tally.total_batches, total, started);
        info!(total, batches = tally.total_batches, "records to sync");

        for batch_index in 0..tally.total_batches {
            let offset = batch_index * batch_size;
            let expected = batch_size.min(total - offset);
            let records = match self.source.fetch_records(&filter, offset, batch_size).await {
                Ok(records) => records,
                Err(err) => {
                    tally.fail(batch_index, expected, SyncPhase::Fetching, &err);
                    continue;
                }
            };
            tracker.emit(SyncPhase::Fetching, batch_index, tally.processed() + records.len());
            self.process_batch(&mut tally, &tracker, batch_index, records).await;
        }

        self.finish(tally)
    }

    //==========================================================================
    // Incremental sync
    //==========================================================================

    /// Re-index records modified since the later of `since` and the last
    /// successful sync.
    #[instrument(skip(self, progress))]
    pub async fn incremental_sync(
        &self,
        since: Option<DateTime<Utc>>,
        progress: Option<ProgressCallback<'_>>,
    ) -> SyncResult {
        let started = Instant::now();
        let Some(_gate) = self.try_begin() else {
            return self.rejected(SyncKind::Incremental, started);
        };

        let since = self.effective_since(since);
        info!(since = %since, "incremental sync started");

        let changed = match self
            .source
            .fetch_modified_since(
                since,
                self.config.include_archived_in_incremental,
                self.config.batch_size,
            )
            .await
        {
            Ok(changed) => changed,
            Err(err) => {
                return self.abort(SyncKind::Incremental, started, "could not fetch changes", &err)
            }
        };

        if changed.is_empty() {
            info!("no changes since last sync");
            return SyncResult {
                kind: SyncKind::Incremental,
                success: true,
                records_synced: 0,
                records_failed: 0,
                records_deleted: 0,
                duration_ms: elapsed_ms(started),
                sync_version: self.state.lock().sync_version,
                errors: Vec::new(),
            };
        }

        if let Err(err) = self.sink.ensure_collection(self.embedder.dimensions()).await {
            return self.abort(SyncKind::Incremental, started, "could not ensure collection", &err);
        }

        let total = changed.len();
        let batch_size = self.config.batch_size;
        let mut tally = self.tally(SyncKind::Incremental, started, total.div_ceil(batch_size));
        let tracker = ProgressTracker::new(progress, tally.total_batches, total, started);
        info!(changed = total, batches = tally.total_batches, "changed records to sync");

        let mut remaining = changed.into_iter();
        for batch_index in 0..tally.total_batches {
            let records: Vec<SourceRecord> = remaining.by_ref().take(batch_size).collect();
            tracker.emit(SyncPhase::Fetching, batch_index, tally.processed() + records.len());
            self.process_batch(&mut tally, &tracker, batch_index, records).await;
        }

        self.finish(tally)
    }

    fn effective_since(&self, since: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let last = self.state.lock().last_sync_time;
        match (since, last) {
            (Some(a), Some(b)) => a.max(b),
            (Some(t), None) | (None, Some(t)) => t,
            (None, None) => match self.config.incremental_fallback {
                IncrementalFallback::FullHistory => DateTime::<Utc>::default(),
                IncrementalFallback::WindowHours(hours) => {
                    Utc::now() - ChronoDuration::hours(i64::from(hours))
                }
            },
        }
    }

    //==========================================================================
    // Single record
    //==========================================================================

    /// Re-index one record now. Archived or missing records have their
    /// vector removed. Errors are returned as-is and sync bookkeeping is
    /// left untouched.
    #[instrument(skip(self))]
    pub async fn sync_record(&self, id: i64) -> Result<SingleSyncOutcome> {
        let vector_id = VectorRecord::id_for(id);
        let record = match self.source.fetch_record(id).await? {
            Some(record) if record.active => record,
            _ => {
                self.sink.delete(std::slice::from_ref(&vector_id)).await?;
                info!(id, "record archived or missing, vector removed");
                return Ok(SingleSyncOutcome::Deleted { id: vector_id });
            }
        };

        let text = build_embedding_text(&record);
        let vectors =
            self.embedder.embed_batch(std::slice::from_ref(&text), InputType::Document).await?;
        let values = vectors.into_iter().next().ok_or_else(|| {
            VectorSyncError::Embedding("provider returned no vector for record".to_string())
        })?;

        let version = self.state.lock().sync_version;
        let vector = build_vector_record(&record, text, values, version, Utc::now());
        self.sink.upsert(std::slice::from_ref(&vector)).await?;
        info!(id, "record synced");
        Ok(SingleSyncOutcome::Upserted { id: vector.id })
    }

    //==========================================================================
    // Status
    //==========================================================================

    /// Composite health view. Never starts a sync.
    pub async fn status(&self) -> SyncStatus {
        let embedding_available = self.embedder.is_available();
        let vector_store = self.sink.health().await;
        let healthy = embedding_available && vector_store.reachable && !vector_store.breaker_open;
        SyncStatus {
            healthy,
            embedding_available,
            embedding_model: self.embedder.model_name().to_string(),
            vector_store,
            state: self.state(),
        }
    }

    //==========================================================================
    // Internals
    //==========================================================================

    fn try_begin(&self) -> Option<SyncGate<'_>> {
        self.syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncGate { flag: &self.syncing })
    }

    fn tally(&self, kind: SyncKind, started: Instant, total_batches: usize) -> RunTally {
        RunTally {
            kind,
            started,
            started_at: Utc::now(),
            total_batches,
            target_version: self.state.lock().sync_version + 1,
            synced: 0,
            failed: 0,
            deleted: 0,
            errors: Vec::new(),
        }
    }

    async fn process_batch(
        &self,
        tally: &mut RunTally,
        tracker: &ProgressTracker<'_>,
        batch_index: usize,
        records: Vec<SourceRecord>,
    ) {
        let (live, archived): (Vec<_>, Vec<_>) = records.into_iter().partition(|r| r.active);

        if !archived.is_empty() {
            let ids: Vec<String> = archived.iter().map(|r| VectorRecord::id_for(r.id)).collect();
            match self.sink.delete(&ids).await {
                Ok(()) => tally.deleted += ids.len(),
                Err(err) => tally.fail(batch_index, ids.len(), SyncPhase::Upserting, &err),
            }
        }
        if live.is_empty() {
            return;
        }

        let texts: Vec<String> = live.iter().map(build_embedding_text).collect();
        let vectors = match self.embedder.embed_batch(&texts, InputType::Document).await {
            Ok(vectors) if vectors.len() == live.len() => vectors,
            Ok(vectors) => {
                let err = VectorSyncError::Embedding(format!(
                    "provider returned {} vectors for {} texts",
                    vectors.len(),
                    live.len()
                ));
                tally.fail(batch_index, live.len(), SyncPhase::Embedding, &err);
                return;
            }
            Err(err) => {
                tally.fail(batch_index, live.len(), SyncPhase::Embedding, &err);
                return;
            }
        };
        tracker.emit(SyncPhase::Embedding, batch_index, tally.processed() + live.len());

        let synced_at = Utc::now();
        let points: Vec<VectorRecord> = live
            .iter()
            .zip(texts)
            .zip(vectors)
            .map(|((record, text), values)| {
                build_vector_record(record, text, values, tally.target_version, synced_at)
            })
            .collect();

        match self.sink.upsert(&points).await {
            Ok(_) => {
                tally.synced += points.len();
                tracker.emit(SyncPhase::Upserting, batch_index, tally.processed());
            }
            Err(err) => tally.fail(batch_index, points.len(), SyncPhase::Upserting, &err),
        }
    }

    fn finish(&self, tally: RunTally) -> SyncResult {
        let sync_version = {
            let mut state = self.state.lock();
            if tally.synced > 0 {
                state.sync_version = tally.target_version;
                // Failed records are only picked up again if the next
                // incremental window still covers them.
                if tally.failed == 0 {
                    state.last_sync_time = Some(tally.started_at);
                }
            }
            state.sync_version
        };

        let result = SyncResult {
            kind: tally.kind,
            success: tally.failed == 0,
            records_synced: tally.synced,
            records_failed: tally.failed,
            records_deleted: tally.deleted,
            duration_ms: elapsed_ms(tally.started),
            sync_version,
            errors: tally.errors,
        };
        if result.success {
            info!(
                kind = ?result.kind,
                synced = result.records_synced,
                deleted = result.records_deleted,
                version = result.sync_version,
                duration_ms = result.duration_ms,
                "sync completed"
            );
        } else {
            warn!(
                kind = ?result.kind,
                synced = result.records_synced,
                failed = result.records_failed,
                version = result.sync_version,
                "sync completed with failures"
            );
        }
        result
    }

    fn rejected(&self, kind: SyncKind, started: Instant) -> SyncResult {
        warn!(kind = ?kind, "sync request rejected, another sync is running");
        SyncResult::aborted(
            kind,
            self.state.lock().sync_version,
            elapsed_ms(started),
            VectorSyncError::SyncAlreadyInProgress.to_string(),
        )
    }

    fn abort(&self, kind: SyncKind, started: Instant, what: &str, err: &VectorSyncError) -> SyncResult {
        error!(kind = ?kind, error = %err, "{what}, sync aborted");
        SyncResult::aborted(
            kind,
            self.state.lock().sync_version,
            elapsed_ms(started),
            format!("{what}: {err}"),
        )
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
