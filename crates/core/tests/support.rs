//! In-memory fakes for the sync ports.
//!
//! Each fake records what it was asked to do so tests can assert on calls
//! as well as on results.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use vectorsync_core::{EmbeddingProvider, RecordSource, VectorSink};
use vectorsync_domain::{
    InputType, RecordFilter, Result, SourceRecord, VectorRecord, VectorStoreHealth,
    VectorSyncError,
};

/// `count` active leads with ids `1..=count`.
pub fn make_records(count: usize) -> Vec<SourceRecord> {
    (1..=count)
        .map(|i| {
            let id = i64::try_from(i).expect("id fits");
            let mut record = SourceRecord::new(id, format!("Lead {id}"));
            record.company_name = Some(format!("Company {id}"));
            record
        })
        .collect()
}

//==============================================================================
// Source
//==============================================================================

#[derive(Default)]
pub struct FakeSource {
    records: Mutex<Vec<SourceRecord>>,
    changed: Mutex<Vec<SourceRecord>>,
    fail_offsets: Mutex<HashSet<usize>>,
    fail_count: Mutex<bool>,
    /// When set, `count_records` waits on it before answering.
    hold: Mutex<Option<Arc<Notify>>>,
    pub since_seen: Mutex<Vec<DateTime<Utc>>>,
    pub fetch_calls: AtomicUsize,
}

impl FakeSource {
    pub fn with_records(records: Vec<SourceRecord>) -> Self {
        let source = Self::default();
        *source.records.lock().expect("lock") = records;
        source
    }

    pub fn set_changed(&self, changed: Vec<SourceRecord>) {
        *self.changed.lock().expect("lock") = changed;
    }

    pub fn fail_fetch_at(&self, offset: usize) {
        self.fail_offsets.lock().expect("lock").insert(offset);
    }

    pub fn fail_count(&self) {
        *self.fail_count.lock().expect("lock") = true;
    }

    pub fn hold_until(&self, gate: Arc<Notify>) {
        *self.hold.lock().expect("lock") = Some(gate);
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn count_records(&self, _filter: &RecordFilter) -> Result<usize> {
        let gate = self.hold.lock().expect("lock").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if *self.fail_count.lock().expect("lock") {
            return Err(VectorSyncError::Network("connection refused".into()));
        }
        Ok(self.records.lock().expect("lock").len())
    }

    async fn fetch_records(
        &self,
        _filter: &RecordFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SourceRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_offsets.lock().expect("lock").contains(&offset) {
            return Err(VectorSyncError::Remote(format!("page at {offset} unavailable")));
        }
        let records = self.records.lock().expect("lock");
        Ok(records.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn fetch_record(&self, id: i64) -> Result<Option<SourceRecord>> {
        let records = self.records.lock().expect("lock");
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn fetch_modified_since(
        &self,
        since: DateTime<Utc>,
        include_archived: bool,
        _batch_size: usize,
    ) -> Result<Vec<SourceRecord>> {
        self.since_seen.lock().expect("lock").push(since);
        let changed = self.changed.lock().expect("lock");
        Ok(changed.iter().filter(|r| include_archived || r.active).cloned().collect())
    }
}

//==============================================================================
// Embedder
//==============================================================================

pub struct FakeEmbedder {
    dimensions: usize,
    available: bool,
    /// One-based call numbers that fail.
    fail_calls: Mutex<HashSet<usize>>,
    drop_one_on_call: Mutex<Option<usize>>,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            available: true,
            fail_calls: Mutex::new(HashSet::new()),
            drop_one_on_call: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable(dimensions: usize) -> Self {
        Self { available: false, ..Self::new(dimensions) }
    }

    pub fn fail_on_call(&self, call: usize) {
        self.fail_calls.lock().expect("lock").insert(call);
    }

    pub fn short_on_call(&self, call: usize) {
        *self.drop_one_on_call.lock().expect("lock") = Some(call);
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-embed"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn embed_batch(&self, texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_calls.lock().expect("lock").contains(&call) {
            return Err(VectorSyncError::Embedding("rate limit exceeded".into()));
        }
        let mut vectors: Vec<Vec<f32>> = texts
            .iter()
            .map(|text| {
                #[allow(clippy::cast_precision_loss)]
                let seed = text.len() as f32;
                (0..self.dimensions).map(|d| seed + d as f32).collect()
            })
            .collect();
        if *self.drop_one_on_call.lock().expect("lock") == Some(call) {
            vectors.pop();
        }
        Ok(vectors)
    }
}

//==============================================================================
// Sink
//==============================================================================

#[derive(Default)]
pub struct FakeSink {
    pub points: Mutex<BTreeMap<String, VectorRecord>>,
    pub deleted: Mutex<Vec<String>>,
    pub ensure_calls: AtomicUsize,
    fail_upserts: Mutex<bool>,
    fail_ensure: Mutex<bool>,
    breaker_open: Mutex<bool>,
}

impl FakeSink {
    pub fn fail_upserts(&self) {
        *self.fail_upserts.lock().expect("lock") = true;
    }

    pub fn fail_ensure(&self) {
        *self.fail_ensure.lock().expect("lock") = true;
    }

    pub fn open_breaker(&self) {
        *self.breaker_open.lock().expect("lock") = true;
    }

    pub fn len(&self) -> usize {
        self.points.lock().expect("lock").len()
    }

    pub fn point(&self, id: &str) -> Option<VectorRecord> {
        self.points.lock().expect("lock").get(id).cloned()
    }
}

#[async_trait]
impl VectorSink for FakeSink {
    async fn ensure_collection(&self, _dimensions: usize) -> Result<bool> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_ensure.lock().expect("lock") {
            return Err(VectorSyncError::VectorStore("collection create refused".into()));
        }
        Ok(false)
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if *self.fail_upserts.lock().expect("lock") {
            return Err(VectorSyncError::VectorStore("disk full".into()));
        }
        let mut points = self.points.lock().expect("lock");
        for record in records {
            points.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut points = self.points.lock().expect("lock");
        for id in ids {
            points.remove(id);
        }
        self.deleted.lock().expect("lock").extend(ids.iter().cloned());
        Ok(())
    }

    async fn health(&self) -> VectorStoreHealth {
        let open = *self.breaker_open.lock().expect("lock");
        VectorStoreHealth {
            breaker_state: if open { "OPEN" } else { "CLOSED" }.to_string(),
            breaker_open: open,
            seconds_until_retry: if open { 30 } else { 0 },
            reachable: true,
        }
    }
}
