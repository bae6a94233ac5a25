//! Port interfaces for the source system

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use vectorsync_domain::{RecordFilter, Result, SourceRecord};

/// Page window and ordering for a `search_read` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
    pub order: Option<String>,
}

impl PageRequest {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit, order: Some("id asc".to_string()) }
    }
}

/// Raw remote API of the source system.
///
/// Rows come back as JSON objects; decoding into domain types is the
/// caller's job.
#[async_trait]
pub trait SourceSystemApi: Send + Sync {
    /// Exchange configured credentials for a numeric session/user id.
    async fn authenticate(&self) -> Result<i64>;

    /// Read `fields` of `model` rows matching `filter`.
    async fn search_read(
        &self,
        session: i64,
        model: &str,
        filter: &RecordFilter,
        fields: &[&str],
        page: &PageRequest,
    ) -> Result<Vec<Value>>;

    /// Count `model` rows matching `filter`.
    async fn search_count(&self, session: i64, model: &str, filter: &RecordFilter) -> Result<usize>;

    /// Cheap reachability probe; `Ok(false)` when the server is unreachable.
    async fn ping(&self) -> Result<bool>;
}

/// Record access consumed by the sync pipeline.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Number of records matching `filter`.
    async fn count_records(&self, filter: &RecordFilter) -> Result<usize>;

    /// One page of records matching `filter`, ordered by id.
    async fn fetch_records(
        &self,
        filter: &RecordFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SourceRecord>>;

    /// Single record by id; `None` when it does not exist.
    async fn fetch_record(&self, id: i64) -> Result<Option<SourceRecord>>;

    /// Every record modified at or after `since`, paged by `batch_size`.
    async fn fetch_modified_since(
        &self,
        since: DateTime<Utc>,
        include_archived: bool,
        batch_size: usize,
    ) -> Result<Vec<SourceRecord>>;
}
