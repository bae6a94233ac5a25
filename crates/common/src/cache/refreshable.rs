//! Stale-while-revalidate cache with bounded capacity.
//!
//! # Architecture
//!
//! ```text
//!   RefreshableCache
//!     ├── LruStore<K, Entry<V>>   capacity policy (evict LRU on overflow)
//!     ├── EntryTiming             expiry/refresh policy (fresh/stale/expired)
//!     ├── in_flight: HashMap<K, RefreshSlot>
//!     │                           at most one background refresh per key
//!     └── TaskTracker             join point for spawned refreshes
//! ```
//!
//! Locks are synchronous and never held across an `.await`. Refresh futures
//! run outside the lock and write back only if the key was not deleted or
//! cleared while they ran. Lock order is `in_flight` before `store`.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::policy::{EntryTiming, Freshness};
use super::stats::{CacheStats, MetricsCollector};
use super::store::LruStore;
use crate::resilience::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    timing: EntryTiming,
}

enum Lookup<V> {
    Fresh(V),
    Stale(V),
    Miss,
}

/// Bookkeeping for one running background refresh.
#[derive(Debug, Default)]
struct RefreshSlot {
    /// Set by `delete`/`clear`; the refreshed value is then discarded.
    invalidated: bool,
}

type InFlight<K> = Arc<Mutex<HashMap<K, RefreshSlot>>>;

struct Shared<K: Hash + Eq, V, C> {
    store: Mutex<LruStore<K, Entry<V>>>,
    in_flight: InFlight<K>,
    tasks: TaskTracker,
    metrics: MetricsCollector,
    config: CacheConfig,
    clock: C,
}

/// Removes a key from the in-flight set when the refresh task settles,
/// including when it panics or is aborted.
struct InFlightGuard<K: Hash + Eq> {
    key: K,
    in_flight: InFlight<K>,
}

impl<K: Hash + Eq> Drop for InFlightGuard<K> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}

/// Key/value cache with per-entry TTL, LRU capacity and background refresh.
///
/// Clones share the same entries.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use vectorsync_common::cache::{CacheConfig, RefreshableCache};
///
/// # tokio_test::block_on(async {
/// let cache: RefreshableCache<&str, u32> = RefreshableCache::new(CacheConfig::default());
/// let value = cache
///     .get_with_refresh("answer", || async { Ok::<_, std::io::Error>(42) }, Duration::from_secs(60), 80)
///     .await
///     .unwrap();
/// assert_eq!(value, 42);
/// assert!(cache.has(&"answer"));
/// # });
/// ```
pub struct RefreshableCache<K: Hash + Eq, V, C: Clock = SystemClock> {
    shared: Arc<Shared<K, V, C>>,
}

impl<K: Hash + Eq, V, C: Clock> Clone for RefreshableCache<K, V, C> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<K: Hash + Eq, V, C: Clock> fmt::Debug for RefreshableCache<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshableCache")
            .field("config", &self.shared.config)
            .field("len", &self.shared.store.lock().len())
            .finish_non_exhaustive()
    }
}

impl<K, V> RefreshableCache<K, V, SystemClock>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache on the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, V, C> RefreshableCache<K, V, C>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clock,
{
    /// Creates a cache driven by `clock`.
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self {
            shared: Arc::new(Shared {
                store: Mutex::new(LruStore::new(config.max_entries)),
                in_flight: Arc::new(Mutex::new(HashMap::new())),
                tasks: TaskTracker::new(),
                metrics: MetricsCollector::default(),
                config,
                clock,
            }),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    //==========================================================================
    // Stale-while-revalidate
    //==========================================================================

    /// Returns the value for `key`, loading or refreshing it through
    /// `refresh` as its age requires.
    ///
    /// - missing or expired: `refresh` is awaited inline and its result
    ///   stored with a new `ttl` window (a miss; errors propagate)
    /// - younger than `threshold_percent` of `ttl`: cached value (a hit)
    /// - older than that but unexpired: cached value (a hit), and `refresh`
    ///   is spawned in the background unless a refresh for `key` is already
    ///   running. A failed background refresh is logged and the stale entry
    ///   stays in place.
    pub async fn get_with_refresh<F, Fut, E>(
        &self,
        key: K,
        refresh: F,
        ttl: Duration,
        threshold_percent: u8,
    ) -> Result<V, E>
    where
        K: fmt::Debug,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        match self.lookup(&key, threshold_percent) {
            Lookup::Fresh(value) => {
                self.shared.metrics.record_hit();
                Ok(value)
            }
            Lookup::Stale(value) => {
                self.shared.metrics.record_hit();
                self.spawn_refresh(key, refresh, ttl);
                Ok(value)
            }
            Lookup::Miss => {
                self.shared.metrics.record_miss();
                let value = refresh().await?;
                self.set_with_ttl(key, value.clone(), ttl);
                Ok(value)
            }
        }
    }

    fn lookup(&self, key: &K, threshold_percent: u8) -> Lookup<V> {
        let now = self.shared.clock.now();
        let mut store = self.shared.store.lock();
        let found = store
            .get(key)
            .map(|entry| (entry.timing.classify(now, threshold_percent), entry.value.clone()));
        match found {
            None => Lookup::Miss,
            Some((Freshness::Fresh, value)) => Lookup::Fresh(value),
            Some((Freshness::Stale, value)) => Lookup::Stale(value),
            Some((Freshness::Expired, _)) => {
                store.remove(key);
                self.shared.metrics.record_expirations(1);
                Lookup::Miss
            }
        }
    }

    fn spawn_refresh<F, Fut, E>(&self, key: K, refresh: F, ttl: Duration)
    where
        K: fmt::Debug,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        {
            let mut in_flight = self.shared.in_flight.lock();
            if in_flight.contains_key(&key) {
                debug!(key = ?key, "refresh already in flight");
                return;
            }
            in_flight.insert(key.clone(), RefreshSlot::default());
        }

        let guard = InFlightGuard { key: key.clone(), in_flight: Arc::clone(&self.shared.in_flight) };
        let cache = self.clone();
        debug!(key = ?key, "scheduling background refresh");

        self.shared.tasks.spawn(async move {
            let _guard = guard;
            match refresh().await {
                Ok(value) => {
                    let in_flight = cache.shared.in_flight.lock();
                    if in_flight.get(&key).is_some_and(|slot| slot.invalidated) {
                        debug!(key = ?key, "key invalidated during refresh, discarding value");
                        return;
                    }
                    cache.set_with_ttl(key, value, ttl);
                    drop(in_flight);
                    cache.shared.metrics.record_refresh();
                }
                Err(error) => {
                    cache.shared.metrics.record_refresh_failure();
                    warn!(key = ?key, error = %error, "background refresh failed, keeping stale value");
                }
            }
        });
    }

    /// Keys with a background refresh currently running.
    pub fn refreshes_in_flight(&self) -> usize {
        self.shared.in_flight.lock().len()
    }

    /// Waits until every spawned refresh task has settled.
    pub async fn wait_for_refreshes(&self) {
        self.shared.tasks.close();
        self.shared.tasks.wait().await;
        self.shared.tasks.reopen();
    }

    //==========================================================================
    // Plain operations
    //==========================================================================

    /// Returns the value for `key` unless missing or expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.shared.clock.now();
        let mut store = self.shared.store.lock();
        let expired = match store.get(key) {
            Some(entry) if !entry.timing.is_expired(now) => {
                self.shared.metrics.record_hit();
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            store.remove(key);
            self.shared.metrics.record_expirations(1);
        }
        self.shared.metrics.record_miss();
        None
    }

    /// Stores `value` under `key` with the configured default TTL.
    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.shared.config.default_ttl);
    }

    /// Stores `value` under `key` with an explicit TTL.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let timing = EntryTiming::starting_at(self.shared.clock.now(), ttl);
        let evicted = self.shared.store.lock().insert(key, Entry { value, timing });
        self.shared.metrics.record_insert();
        if evicted.is_some() {
            self.shared.metrics.record_eviction();
        }
    }

    /// Whether an unexpired entry exists. Does not affect recency or
    /// hit/miss counters.
    pub fn has(&self, key: &K) -> bool {
        let now = self.shared.clock.now();
        self.shared.store.lock().peek(key).is_some_and(|entry| !entry.timing.is_expired(now))
    }

    /// Removes `key`; returns whether an entry was present.
    ///
    /// A background refresh already running for `key` will not write its
    /// result back.
    pub fn delete(&self, key: &K) -> bool {
        let mut in_flight = self.shared.in_flight.lock();
        if let Some(slot) = in_flight.get_mut(key) {
            slot.invalidated = true;
        }
        self.shared.store.lock().remove(key).is_some()
    }

    /// Drops all entries and resets the counters. Running background
    /// refreshes are discarded when they settle.
    pub fn clear(&self) {
        let mut in_flight = self.shared.in_flight.lock();
        for slot in in_flight.values_mut() {
            slot.invalidated = true;
        }
        self.shared.store.lock().clear();
        self.shared.metrics.reset();
    }

    /// Sweeps out every expired entry and returns how many were removed.
    pub fn clear_expired(&self) -> usize {
        let now = self.shared.clock.now();
        let removed = self.shared.store.lock().remove_where(|entry| entry.timing.is_expired(now));
        if removed > 0 {
            self.shared.metrics.record_expirations(removed as u64);
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    /// Keys from most to least recently used, expired ones included until
    /// they are read or swept.
    pub fn keys(&self) -> Vec<K> {
        self.shared.store.lock().keys()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.shared.store.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.shared.store.lock().is_empty()
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        let store = self.shared.store.lock();
        self.shared.metrics.snapshot(store.len(), store.capacity())
    }

    /// Zeroes hit/miss and eviction counters without touching entries.
    pub fn reset_metrics(&self) {
        self.shared.metrics.reset();
    }
}
