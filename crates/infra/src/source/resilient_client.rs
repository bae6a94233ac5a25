//! Resilient access to the source system.
//!
//! Every remote call goes through one circuit breaker and a per-call time
//! bound. The session id from `authenticate` is cached and only dropped on
//! an authentication failure or an explicit [`ResilientClient::reset_session`].
//! Reference tables are served from a stale-while-revalidate cache with
//! per-table TTLs.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use vectorsync_common::cache::{CacheConfig, CacheStats, RefreshableCache};
use vectorsync_common::resilience::{
    with_timeout, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, Clock, SystemClock,
};
use vectorsync_core::{PageRequest, RecordSource, SourceSystemApi};
use vectorsync_domain::{
    BreakerConfig, CacheSettings, FetchProgress, RecordFilter, ReferenceKey, ReferenceTable,
    Result, Salesperson, SourceConfig, SourceRecord, Stage, Tag, Team, TimeoutSettings,
    VectorSyncError,
};

use super::wire::{self, RECORD_FIELDS};

/// Callback invoked after each page of a bulk fetch.
pub type FetchProgressCallback<'a> = &'a (dyn Fn(FetchProgress) + Send + Sync);

/// Upper bound on rows read for one reference table.
const REFERENCE_PAGE_LIMIT: usize = 1000;

struct ReferenceTtls {
    stages: Duration,
    teams: Duration,
    salespeople: Duration,
    tags: Duration,
}

impl ReferenceTtls {
    const fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            stages: Duration::from_secs(settings.stages_ttl_secs),
            teams: Duration::from_secs(settings.teams_ttl_secs),
            salespeople: Duration::from_secs(settings.salespeople_ttl_secs),
            tags: Duration::from_secs(settings.tags_ttl_secs),
        }
    }

    const fn for_key(&self, key: ReferenceKey) -> Duration {
        match key {
            ReferenceKey::Stages => self.stages,
            ReferenceKey::Teams => self.teams,
            ReferenceKey::Salespeople => self.salespeople,
            ReferenceKey::Tags => self.tags,
        }
    }
}

struct Inner<C: Clock> {
    api: Arc<dyn SourceSystemApi>,
    breaker: CircuitBreaker<C>,
    cache: RefreshableCache<ReferenceKey, ReferenceTable, C>,
    session: Mutex<Option<i64>>,
    model: String,
    timeouts: TimeoutSettings,
    ttls: ReferenceTtls,
    refresh_threshold_percent: u8,
}

/// Source-system client with breaker, timeouts, cached session and a
/// reference-data cache.
///
/// Cloning is cheap and clones share all state.
pub struct ResilientClient<C: Clock = SystemClock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for ResilientClient<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl ResilientClient<SystemClock> {
    /// Create a client with its own breaker, driven by the system clock.
    pub fn new(
        api: Arc<dyn SourceSystemApi>,
        source: &SourceConfig,
        cache: &CacheSettings,
        breaker: &BreakerConfig,
    ) -> Result<Self> {
        Self::with_clock(api, source, cache, breaker, SystemClock)
    }
}

impl<C: Clock + Clone> ResilientClient<C> {
    /// Create a client whose breaker and cache read time from `clock`.
    pub fn with_clock(
        api: Arc<dyn SourceSystemApi>,
        source: &SourceConfig,
        cache: &CacheSettings,
        breaker: &BreakerConfig,
        clock: C,
    ) -> Result<Self> {
        let breaker = CircuitBreaker::with_clock(
            CircuitBreakerConfig {
                failure_threshold: breaker.failure_threshold,
                reset_timeout: Duration::from_secs(breaker.reset_timeout_secs),
            },
            clock.clone(),
        )?
        .named("source");
        Self::with_breaker(api, source, cache, breaker, clock)
    }

    /// Create a client that shares an existing breaker, e.g. one breaker for
    /// several clients pointed at the same endpoint.
    pub fn with_breaker(
        api: Arc<dyn SourceSystemApi>,
        source: &SourceConfig,
        cache: &CacheSettings,
        breaker: CircuitBreaker<C>,
        clock: C,
    ) -> Result<Self> {
        let cache_config = CacheConfig::builder()
            .max_entries(cache.max_entries)
            .refresh_threshold_percent(cache.refresh_threshold_percent)
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                api,
                breaker,
                cache: RefreshableCache::with_clock(cache_config, clock),
                session: Mutex::new(None),
                model: source.model.clone(),
                timeouts: source.timeouts,
                ttls: ReferenceTtls::from_settings(cache),
                refresh_threshold_percent: cache.refresh_threshold_percent,
            }),
        })
    }

    //==========================================================================
    // Session
    //==========================================================================

    /// Cached session id, authenticating first if there is none.
    pub async fn authenticate(&self) -> Result<i64> {
        let inner = &*self.inner;
        inner.breaker.execute(|| inner.session()).await
    }

    /// Forget the cached session; the next call re-authenticates.
    pub fn reset_session(&self) {
        *self.inner.session.lock() = None;
        info!("source session reset");
    }

    //==========================================================================
    // Records
    //==========================================================================

    /// Number of records matching `filter`.
    pub async fn count(&self, filter: &RecordFilter) -> Result<usize> {
        let inner = &*self.inner;
        inner
            .call("search_count", inner.timeouts.interactive(), |session| {
                inner.api.search_count(session, &inner.model, filter)
            })
            .await
    }

    /// One page of records ordered by id, bounded by the bulk timeout.
    pub async fn fetch_page(
        &self,
        filter: &RecordFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SourceRecord>> {
        let inner = &*self.inner;
        let page = PageRequest::new(offset, limit);
        let rows = inner
            .call("search_read", inner.timeouts.bulk(), |session| {
                inner.api.search_read(session, &inner.model, filter, RECORD_FIELDS, &page)
            })
            .await?;
        wire::decode_rows(&rows, wire::decode_record)
    }

    /// Page through records matching `filter` until `target` records (or
    /// all of them) are read.
    ///
    /// A failing page aborts the fetch with that page's error.
    #[instrument(skip(self, filter, on_progress))]
    pub async fn fetch_all(
        &self,
        filter: &RecordFilter,
        target: Option<usize>,
        batch_size: usize,
        on_progress: Option<FetchProgressCallback<'_>>,
    ) -> Result<Vec<SourceRecord>> {
        let batch_size = batch_size.max(1);
        let total = self.count(filter).await?;
        let wanted = target.map_or(total, |t| t.min(total));
        let mut records = Vec::with_capacity(wanted);

        while records.len() < wanted {
            let limit = batch_size.min(wanted - records.len());
            let page = self.fetch_page(filter, records.len(), limit).await?;
            let exhausted = page.len() < limit;
            records.extend(page);

            debug!(fetched = records.len(), total, "fetched page");
            if let Some(callback) = on_progress {
                callback(FetchProgress { fetched: records.len(), total });
            }
            if exhausted {
                break;
            }
        }

        Ok(records)
    }

    /// Every record modified at or after `since`.
    pub async fn fetch_modified_since(
        &self,
        since: DateTime<Utc>,
        include_archived: bool,
        batch_size: usize,
        on_progress: Option<FetchProgressCallback<'_>>,
    ) -> Result<Vec<SourceRecord>> {
        let mut filter = RecordFilter::modified_since(since);
        if include_archived {
            filter = filter.and(RecordFilter::including_archived());
        }
        self.fetch_all(&filter, None, batch_size, on_progress).await
    }

    /// One record by id, archived or not.
    pub async fn fetch_by_id(&self, id: i64) -> Result<Option<SourceRecord>> {
        let inner = &*self.inner;
        let filter = RecordFilter::eq("id", id).and(RecordFilter::including_archived());
        let page = PageRequest::new(0, 1);
        let rows = inner
            .call("read_record", inner.timeouts.interactive(), |session| {
                inner.api.search_read(session, &inner.model, &filter, RECORD_FIELDS, &page)
            })
            .await?;
        rows.first().map(wire::decode_record).transpose()
    }

    //==========================================================================
    // Reference data
    //==========================================================================

    pub async fn stages(&self) -> Result<Vec<Stage>> {
        match self.reference(ReferenceKey::Stages).await? {
            ReferenceTable::Stages(rows) => Ok(rows),
            other => Err(mismatch(ReferenceKey::Stages, &other)),
        }
    }

    pub async fn teams(&self) -> Result<Vec<Team>> {
        match self.reference(ReferenceKey::Teams).await? {
            ReferenceTable::Teams(rows) => Ok(rows),
            other => Err(mismatch(ReferenceKey::Teams, &other)),
        }
    }

    pub async fn salespeople(&self) -> Result<Vec<Salesperson>> {
        match self.reference(ReferenceKey::Salespeople).await? {
            ReferenceTable::Salespeople(rows) => Ok(rows),
            other => Err(mismatch(ReferenceKey::Salespeople, &other)),
        }
    }

    pub async fn tags(&self) -> Result<Vec<Tag>> {
        match self.reference(ReferenceKey::Tags).await? {
            ReferenceTable::Tags(rows) => Ok(rows),
            other => Err(mismatch(ReferenceKey::Tags, &other)),
        }
    }

    async fn reference(&self, key: ReferenceKey) -> Result<ReferenceTable> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .cache
            .get_with_refresh(
                key,
                move || async move { inner.load_reference(key).await },
                self.inner.ttls.for_key(key),
                self.inner.refresh_threshold_percent,
            )
            .await
    }

    /// Drop the named reference tables, or all of them.
    pub fn invalidate(&self, keys: Option<&[ReferenceKey]>) {
        match keys {
            Some(keys) => {
                for key in keys {
                    self.inner.cache.delete(key);
                }
                info!(keys = ?keys, "reference cache entries invalidated");
            }
            None => {
                self.inner.cache.clear();
                info!("reference cache cleared");
            }
        }
    }

    /// Wait for background reference refreshes spawned so far.
    pub async fn wait_for_refreshes(&self) {
        self.inner.cache.wait_for_refreshes().await;
    }

    //==========================================================================
    // Health
    //==========================================================================

    /// Reachability probe under the health timeout. Bypasses the breaker so
    /// a failing probe never opens it.
    pub async fn health_check(&self) -> Result<bool> {
        let inner = &*self.inner;
        match with_timeout("ping", inner.timeouts.health(), inner.api.ping()).await {
            Ok(reachable) => Ok(reachable),
            Err(VectorSyncError::Timeout { .. } | VectorSyncError::Network(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub fn breaker_metrics(&self) -> CircuitBreakerMetrics {
        self.inner.breaker.metrics()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }
}

impl<C: Clock> Inner<C> {
    /// Run `operation` with a session id, under the breaker and `limit`.
    async fn call<T, F, Fut>(&self, operation: &str, limit: Duration, f: F) -> Result<T>
    where
        F: FnOnce(i64) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.breaker
            .execute(|| async move {
                let session = self.session().await?;
                let result = with_timeout(operation, limit, f(session)).await;
                if matches!(&result, Err(err) if err.is_authentication()) {
                    warn!(operation, "session rejected, will re-authenticate");
                    *self.session.lock() = None;
                }
                result
            })
            .await
    }

    async fn session(&self) -> Result<i64> {
        if let Some(session) = *self.session.lock() {
            return Ok(session);
        }
        let session =
            with_timeout("authenticate", self.timeouts.interactive(), self.api.authenticate())
                .await?;
        *self.session.lock() = Some(session);
        info!(session, "authenticated with source system");
        Ok(session)
    }

    async fn load_reference(&self, key: ReferenceKey) -> Result<ReferenceTable> {
        let (model, fields, order) = match key {
            ReferenceKey::Stages => ("crm.stage", wire::STAGE_FIELDS, "sequence asc"),
            ReferenceKey::Teams => ("crm.team", wire::TEAM_FIELDS, "name asc"),
            ReferenceKey::Salespeople => ("res.users", wire::SALESPERSON_FIELDS, "name asc"),
            ReferenceKey::Tags => ("crm.tag", wire::TAG_FIELDS, "name asc"),
        };
        let page = PageRequest {
            offset: 0,
            limit: REFERENCE_PAGE_LIMIT,
            order: Some(order.to_string()),
        };
        let rows: Vec<Value> = self
            .call("load_reference", self.timeouts.interactive(), |session| {
                self.api.search_read(session, model, &RecordFilter::All, fields, &page)
            })
            .await?;

        debug!(%key, rows = rows.len(), "reference table loaded");
        let table = match key {
            ReferenceKey::Stages => {
                ReferenceTable::Stages(wire::decode_rows(&rows, wire::decode_stage)?)
            }
            ReferenceKey::Teams => {
                ReferenceTable::Teams(wire::decode_rows(&rows, wire::decode_team)?)
            }
            ReferenceKey::Salespeople => {
                ReferenceTable::Salespeople(wire::decode_rows(&rows, wire::decode_salesperson)?)
            }
            ReferenceKey::Tags => ReferenceTable::Tags(wire::decode_rows(&rows, wire::decode_tag)?),
        };
        Ok(table)
    }
}

fn mismatch(key: ReferenceKey, table: &ReferenceTable) -> VectorSyncError {
    VectorSyncError::Internal(format!("cache entry {key} holds {} table", table.key()))
}

#[async_trait]
impl<C: Clock + Clone> RecordSource for ResilientClient<C> {
    async fn count_records(&self, filter: &RecordFilter) -> Result<usize> {
        self.count(filter).await
    }

    async fn fetch_records(
        &self,
        filter: &RecordFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SourceRecord>> {
        self.fetch_page(filter, offset, limit).await
    }

    async fn fetch_record(&self, id: i64) -> Result<Option<SourceRecord>> {
        self.fetch_by_id(id).await
    }

    async fn fetch_modified_since(
        &self,
        since: DateTime<Utc>,
        include_archived: bool,
        batch_size: usize,
    ) -> Result<Vec<SourceRecord>> {
        ResilientClient::fetch_modified_since(self, since, include_archived, batch_size, None).await
    }
}
