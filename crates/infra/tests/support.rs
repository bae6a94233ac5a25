//! Shared fakes for infra integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use vectorsync_core::{EmbeddingProvider, PageRequest, SourceSystemApi};
use vectorsync_domain::{
    FilterValue, InputType, RecordFilter, Result, SourceConfig, VectorSyncError,
};

pub const SESSION: i64 = 7;

/// One row as the source system returns it.
pub fn record_row(id: i64, active: bool) -> Value {
    json!({
        "id": id,
        "name": format!("Lead {id}"),
        "type": "opportunity",
        "active": active,
        "partner_name": "Acme",
        "stage_id": [1, "New"],
        "user_id": false,
        "tag_ids": [3],
        "expected_revenue": 1000.0 * id as f64,
        "write_date": "2024-05-01 09:30:00"
    })
}

pub fn stage_row(id: i64, name: &str) -> Value {
    json!({"id": id, "name": name, "sequence": id, "is_won": false})
}

pub fn source_config() -> SourceConfig {
    SourceConfig {
        url: "http://source.invalid".into(),
        database: "crm".into(),
        username: "bot".into(),
        api_key: "secret".into(),
        ..SourceConfig::default()
    }
}

fn id_filter(filter: &RecordFilter) -> Option<i64> {
    match filter {
        RecordFilter::Condition(c) if c.field == "id" => match c.value {
            FilterValue::Int(id) => Some(id),
            _ => None,
        },
        RecordFilter::And(parts) => parts.iter().find_map(id_filter),
        _ => None,
    }
}

/// In-process stand-in for the source system's remote API.
#[derive(Default)]
pub struct ScriptedSourceApi {
    rows: Mutex<Vec<Value>>,
    stages: Mutex<Vec<Value>>,
    failures: Mutex<VecDeque<VectorSyncError>>,
    fail_at_offset: Mutex<Option<usize>>,
    unreachable: AtomicBool,
    pub auth_calls: AtomicUsize,
    pub count_calls: AtomicUsize,
    /// `(model, offset, limit)` of every `search_read`.
    pub reads: Mutex<Vec<(String, usize, usize)>>,
}

impl ScriptedSourceApi {
    pub fn with_records(n: i64) -> Self {
        let api = Self::default();
        *api.rows.lock() = (1..=n).map(|id| record_row(id, true)).collect();
        *api.stages.lock() = vec![stage_row(1, "New"), stage_row(2, "Won")];
        api
    }

    pub fn set_rows(&self, rows: Vec<Value>) {
        *self.rows.lock() = rows;
    }

    pub fn set_stages(&self, stages: Vec<Value>) {
        *self.stages.lock() = stages;
    }

    /// The next data calls fail with these errors, in order.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = VectorSyncError>) {
        self.failures.lock().extend(errors);
    }

    pub fn fail_page_at(&self, offset: usize) {
        *self.fail_at_offset.lock() = Some(offset);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn reads_of(&self, model: &str) -> usize {
        self.reads.lock().iter().filter(|(m, _, _)| m == model).count()
    }

    fn next_failure(&self) -> Result<()> {
        match self.failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SourceSystemApi for ScriptedSourceApi {
    async fn authenticate(&self) -> Result<i64> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        Ok(SESSION)
    }

    async fn search_read(
        &self,
        session: i64,
        model: &str,
        filter: &RecordFilter,
        _fields: &[&str],
        page: &PageRequest,
    ) -> Result<Vec<Value>> {
        assert_eq!(session, SESSION, "calls must carry the cached session");
        self.reads.lock().push((model.to_string(), page.offset, page.limit));
        self.next_failure()?;

        match model {
            "crm.stage" => return Ok(self.stages.lock().clone()),
            "crm.team" | "res.users" | "crm.tag" => return Ok(Vec::new()),
            _ => {}
        }
        if *self.fail_at_offset.lock() == Some(page.offset) {
            return Err(VectorSyncError::Network(format!("page at {} dropped", page.offset)));
        }

        let rows = self.rows.lock();
        if let Some(id) = id_filter(filter) {
            return Ok(rows.iter().filter(|r| r["id"] == id).cloned().collect());
        }
        Ok(rows.iter().skip(page.offset).take(page.limit).cloned().collect())
    }

    async fn search_count(&self, session: i64, _model: &str, _filter: &RecordFilter) -> Result<usize> {
        assert_eq!(session, SESSION);
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.next_failure()?;
        Ok(self.rows.lock().len())
    }

    async fn ping(&self) -> Result<bool> {
        Ok(!self.unreachable.load(Ordering::SeqCst))
    }
}

/// Deterministic embedder: the vector encodes the text length.
pub struct LengthEmbedder {
    pub dimensions: usize,
}

#[async_trait]
impl EmbeddingProvider for LengthEmbedder {
    fn model_name(&self) -> &str {
        "length-embed"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn embed_batch(&self, texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0; self.dimensions];
                v[0] = 1.0;
                v[self.dimensions - 1] = t.len() as f32;
                v
            })
            .collect())
    }
}
