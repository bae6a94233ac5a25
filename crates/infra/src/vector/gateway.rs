//! Vector store access behind its own circuit breaker.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use vectorsync_common::resilience::{
    with_timeout, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState,
    Clock, SystemClock,
};
use vectorsync_core::{VectorSink, VectorStoreApi};
use vectorsync_domain::{
    BreakerConfig, CollectionInfo, CollectionSpec, FieldCondition, IndexParams, MatchValue,
    RecordQuery, Result, SearchRequest, VectorFilter, VectorMatch, VectorRecord,
    VectorStoreConfig, VectorStoreHealth,
};

/// Translate caller-facing search constraints into a store filter.
///
/// Returns `None` when the query constrains nothing.
pub fn build_filter(query: &RecordQuery) -> Option<VectorFilter> {
    let mut filter = VectorFilter::default();

    let any_of = |key: &str, ids: &[i64]| FieldCondition::MatchAny {
        key: key.to_string(),
        values: ids.iter().copied().map(MatchValue::Int).collect(),
    };
    for (key, ids) in [
        ("stage_id", &query.stage_ids),
        ("team_id", &query.team_ids),
        ("salesperson_id", &query.salesperson_ids),
        ("tag_ids", &query.tag_ids),
    ] {
        if !ids.is_empty() {
            filter.must.push(any_of(key, ids));
        }
    }
    if !query.exclude_stage_ids.is_empty() {
        filter.must_not.push(any_of("stage_id", &query.exclude_stage_ids));
    }

    if let Some(record_type) = query.record_type {
        filter.must.push(FieldCondition::Match {
            key: "record_type".into(),
            value: MatchValue::Text(record_type.as_str().to_string()),
        });
    }
    if let Some(active) = query.active {
        filter
            .must
            .push(FieldCondition::Match { key: "active".into(), value: MatchValue::Bool(active) });
    }

    if query.min_expected_revenue.is_some() || query.max_expected_revenue.is_some() {
        filter.must.push(FieldCondition::Range {
            key: "expected_revenue".into(),
            gte: query.min_expected_revenue,
            lte: query.max_expected_revenue,
        });
    }
    if query.created_after.is_some() || query.created_before.is_some() {
        filter.must.push(FieldCondition::Range {
            key: "created_epoch".into(),
            gte: query.created_after.map(|t| t.timestamp() as f64),
            lte: query.created_before.map(|t| t.timestamp() as f64),
        });
    }

    (!filter.is_empty()).then_some(filter)
}

/// Collection-scoped vector store client.
///
/// Writes, reads and searches pass through the breaker and the configured
/// time bound; [`VectorGateway::probe`] does not, so health checks never
/// move the breaker.
pub struct VectorGateway<C: Clock = SystemClock> {
    store: Arc<dyn VectorStoreApi>,
    breaker: CircuitBreaker<C>,
    collection: String,
    config: VectorStoreConfig,
    timeout: Duration,
}

impl VectorGateway<SystemClock> {
    pub fn new(
        store: Arc<dyn VectorStoreApi>,
        config: &VectorStoreConfig,
        breaker: &BreakerConfig,
    ) -> Result<Self> {
        Self::with_clock(store, config, breaker, SystemClock)
    }
}

impl<C: Clock> VectorGateway<C> {
    pub fn with_clock(
        store: Arc<dyn VectorStoreApi>,
        config: &VectorStoreConfig,
        breaker: &BreakerConfig,
        clock: C,
    ) -> Result<Self> {
        let breaker = CircuitBreaker::with_clock(
            CircuitBreakerConfig {
                failure_threshold: breaker.failure_threshold,
                reset_timeout: Duration::from_secs(breaker.reset_timeout_secs),
            },
            clock,
        )?
        .named("vector_store");
        Ok(Self::with_breaker(store, config, breaker))
    }

    /// Gateway guarded by an existing breaker, shared with every other
    /// gateway pointed at the same store.
    pub fn with_breaker(
        store: Arc<dyn VectorStoreApi>,
        config: &VectorStoreConfig,
        breaker: CircuitBreaker<C>,
    ) -> Self {
        Self {
            store,
            breaker,
            collection: config.collection.clone(),
            config: config.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    async fn guarded<T, F, Fut>(&self, operation: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout = self.timeout;
        self.breaker.execute(|| with_timeout(operation, timeout, f())).await
    }

    /// Create the collection for `dimensions`-long vectors if it is missing.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn ensure_collection(&self, dimensions: usize) -> Result<bool> {
        let spec = CollectionSpec {
            name: self.collection.clone(),
            dimensions,
            distance: self.config.distance,
            index: IndexParams { m: self.config.hnsw_m, ef_construct: self.config.hnsw_ef_construct },
        };
        let created = self.guarded("ensure_collection", || self.store.ensure_collection(&spec)).await?;
        if created {
            info!(dimensions, "vector collection created");
        }
        Ok(created)
    }

    pub async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let written =
            self.guarded("upsert", || self.store.upsert(&self.collection, records)).await?;
        debug!(written, "vectors upserted");
        Ok(written)
    }

    pub async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.guarded("delete", || self.store.delete(&self.collection, ids)).await?;
        debug!(count = ids.len(), "vectors deleted");
        Ok(())
    }

    /// Nearest neighbours of `request.vector`, constrained by `request.query`.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<VectorMatch>> {
        let filter = build_filter(&request.query);
        self.guarded("search", || {
            self.store.search(
                &self.collection,
                &request.vector,
                request.top_k,
                filter.as_ref(),
                request.score_threshold,
            )
        })
        .await
    }

    pub async fn retrieve(&self, ids: &[String]) -> Result<Vec<VectorRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.guarded("retrieve", || self.store.retrieve(&self.collection, ids)).await
    }

    pub async fn collection_info(&self) -> Result<CollectionInfo> {
        self.guarded("collection_info", || self.store.collection_info(&self.collection)).await
    }

    /// Reachability check outside the breaker; any failure reads as `false`.
    pub async fn probe(&self) -> bool {
        match with_timeout("vector_health", self.timeout, self.store.health()).await {
            Ok(reachable) => reachable,
            Err(err) => {
                warn!(error = %err, "vector store probe failed");
                false
            }
        }
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn breaker_metrics(&self) -> CircuitBreakerMetrics {
        self.breaker.metrics()
    }
}

#[async_trait]
impl<C: Clock> VectorSink for VectorGateway<C> {
    async fn ensure_collection(&self, dimensions: usize) -> Result<bool> {
        VectorGateway::ensure_collection(self, dimensions).await
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        VectorGateway::upsert(self, records).await
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        VectorGateway::delete(self, ids).await
    }

    async fn health(&self) -> VectorStoreHealth {
        let metrics = self.breaker.metrics();
        VectorStoreHealth {
            breaker_state: metrics.state.to_string(),
            breaker_open: metrics.state == CircuitState::Open,
            seconds_until_retry: metrics.seconds_until_retry,
            reachable: self.probe().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use vectorsync_domain::RecordType;

    use super::*;

    #[test]
    fn empty_query_builds_no_filter() {
        assert_eq!(build_filter(&RecordQuery::default()), None);
    }

    #[test]
    fn query_maps_to_must_and_must_not() {
        let query = RecordQuery {
            stage_ids: vec![1, 2],
            tag_ids: vec![9],
            exclude_stage_ids: vec![4],
            record_type: Some(RecordType::Opportunity),
            active: Some(true),
            min_expected_revenue: Some(500.0),
            created_after: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single(),
            ..RecordQuery::default()
        };

        let filter = build_filter(&query).expect("non-empty");
        assert_eq!(
            filter.must,
            vec![
                FieldCondition::MatchAny {
                    key: "stage_id".into(),
                    values: vec![MatchValue::Int(1), MatchValue::Int(2)]
                },
                FieldCondition::MatchAny { key: "tag_ids".into(), values: vec![MatchValue::Int(9)] },
                FieldCondition::Match {
                    key: "record_type".into(),
                    value: MatchValue::Text("opportunity".into())
                },
                FieldCondition::Match { key: "active".into(), value: MatchValue::Bool(true) },
                FieldCondition::Range { key: "expected_revenue".into(), gte: Some(500.0), lte: None },
                FieldCondition::Range {
                    key: "created_epoch".into(),
                    gte: Some(1_704_067_200.0),
                    lte: None
                },
            ]
        );
        assert_eq!(
            filter.must_not,
            vec![FieldCondition::MatchAny { key: "stage_id".into(), values: vec![MatchValue::Int(4)] }]
        );
    }
}
