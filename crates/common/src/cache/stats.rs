//! Cache statistics and metrics tracking.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics snapshot for health endpoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Current number of entries.
    pub size: usize,

    /// Capacity bound.
    pub max_size: usize,

    /// Reads served from the cache, fresh or stale.
    pub hits: u64,

    /// Reads that found nothing usable.
    pub misses: u64,

    /// Entries written.
    pub inserts: u64,

    /// Entries dropped by capacity pressure.
    pub evictions: u64,

    /// Entries dropped because they were past their TTL.
    pub expirations: u64,

    /// Background refreshes that stored a new value.
    pub background_refreshes: u64,

    /// Background refreshes that failed and kept the stale value.
    pub refresh_failures: u64,
}

impl CacheStats {
    /// Hits over total reads; zero when nothing has been read.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_accesses();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Size over capacity.
    #[allow(clippy::cast_precision_loss)]
    pub fn fill_percentage(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            self.size as f64 / self.max_size as f64
        }
    }

    /// Hits plus misses.
    pub const fn total_accesses(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Lock-free counters behind [`CacheStats`].
#[derive(Debug, Default)]
pub(crate) struct MetricsCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    background_refreshes: AtomicU64,
    refresh_failures: AtomicU64,
}

impl MetricsCollector {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_refresh(&self) {
        self.background_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_refresh_failure(&self) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, size: usize, max_size: usize) -> CacheStats {
        CacheStats {
            size,
            max_size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            background_refreshes: self.background_refreshes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.inserts,
            &self.evictions,
            &self.expirations,
            &self.background_refreshes,
            &self.refresh_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates `CacheStats::hit_rate` for the mixed-access scenario.
    ///
    /// Assertions:
    /// - Hit rate is 0.8 for 80 hits and 20 misses.
    /// - Total accesses equals 100.
    #[test]
    fn test_hit_rate_calculation() {
        let stats = CacheStats { hits: 80, misses: 20, ..Default::default() };
        assert!((stats.hit_rate() - 0.8).abs() < 1e-10);
        assert_eq!(stats.total_accesses(), 100);
    }

    #[test]
    fn test_hit_rate_no_accesses() {
        assert!(CacheStats::default().hit_rate().abs() < f64::EPSILON);
        assert!(CacheStats::default().fill_percentage().abs() < f64::EPSILON);
    }

    #[test]
    fn test_collector_snapshot_and_reset() {
        let collector = MetricsCollector::default();
        collector.record_hit();
        collector.record_hit();
        collector.record_miss();
        collector.record_expirations(3);
        collector.record_refresh_failure();

        let stats = collector.snapshot(4, 10);
        assert_eq!((stats.hits, stats.misses, stats.expirations), (2, 1, 3));
        assert_eq!(stats.refresh_failures, 1);
        assert!((stats.fill_percentage() - 0.4).abs() < 1e-10);

        collector.reset();
        assert_eq!(collector.snapshot(0, 10), CacheStats { max_size: 10, ..Default::default() });
    }
}
