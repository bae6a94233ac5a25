//! Port interfaces for the vector store

use async_trait::async_trait;
use vectorsync_domain::{
    CollectionInfo, CollectionSpec, Result, VectorFilter, VectorMatch, VectorRecord,
    VectorStoreHealth,
};

/// Raw remote API of a vector store.
#[async_trait]
pub trait VectorStoreApi: Send + Sync {
    /// Create the collection if missing; `true` when it was created.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<bool>;

    /// Insert or replace points by id; returns how many were written.
    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<usize>;

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()>;

    /// Top-`top_k` matches by similarity, best first.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&VectorFilter>,
        score_threshold: Option<f32>,
    ) -> Result<Vec<VectorMatch>>;

    /// Points by id, with vectors and payloads. Unknown ids are skipped.
    async fn retrieve(&self, collection: &str, ids: &[String]) -> Result<Vec<VectorRecord>>;

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo>;

    /// Reachability probe.
    async fn health(&self) -> Result<bool>;
}

/// Vector writes consumed by the sync pipeline.
#[async_trait]
pub trait VectorSink: Send + Sync {
    /// Make sure the target collection exists with `dimensions`.
    async fn ensure_collection(&self, dimensions: usize) -> Result<bool>;

    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize>;

    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Breaker state plus a connectivity probe. Never fails.
    async fn health(&self) -> VectorStoreHealth;
}
