//! Weighted progress reporting across fetch/embed/upsert phases.

use std::time::Instant;

use vectorsync_domain::{SyncPhase, SyncProgress};

/// Callback invoked synchronously at each phase boundary.
pub type ProgressCallback<'a> = &'a (dyn Fn(&SyncProgress) + Send + Sync);

/// Computes and emits progress events for one sync run.
pub(crate) struct ProgressTracker<'a> {
    callback: Option<ProgressCallback<'a>>,
    total_batches: usize,
    total_records: usize,
    started: Instant,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(
        callback: Option<ProgressCallback<'a>>,
        total_batches: usize,
        total_records: usize,
        started: Instant,
    ) -> Self {
        Self { callback, total_batches, total_records, started }
    }

    /// Percent complete once `phase` of zero-based `batch_index` finished.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn percent(&self, batch_index: usize, phase: SyncPhase) -> f64 {
        if self.total_batches == 0 {
            return 100.0;
        }
        let done = batch_index as f64 + phase.cumulative_weight();
        let percent = done / self.total_batches as f64 * 100.0;
        (percent * 100.0).round() / 100.0
    }

    pub(crate) fn emit(&self, phase: SyncPhase, batch_index: usize, records_processed: usize) {
        let Some(callback) = self.callback else {
            return;
        };
        callback(&SyncProgress {
            phase,
            current_batch: batch_index + 1,
            total_batches: self.total_batches,
            records_processed,
            total_records: self.total_records,
            percent_complete: self.percent(batch_index, phase),
            elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_percent_is_monotonic_and_ends_at_100() {
        let tracker = ProgressTracker::new(None, 3, 250, Instant::now());
        let mut last = 0.0;
        for batch in 0..3 {
            for phase in [SyncPhase::Fetching, SyncPhase::Embedding, SyncPhase::Upserting] {
                let p = tracker.percent(batch, phase);
                assert!(p > last, "{p} should exceed {last}");
                last = p;
            }
        }
        assert!((last - 100.0).abs() < f64::EPSILON);
        assert!((tracker.percent(0, SyncPhase::Fetching) - 11.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_emit_reports_one_based_batches() {
        let events = Mutex::new(Vec::new());
        let record = |p: &SyncProgress| {
            if let Ok(mut events) = events.lock() {
                events.push(p.clone());
            }
        };
        let tracker = ProgressTracker::new(Some(&record), 2, 150, Instant::now());
        tracker.emit(SyncPhase::Upserting, 1, 150);

        let events = events.lock().expect("lock");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].current_batch, 2);
        assert!((events[0].percent_complete - 100.0).abs() < f64::EPSILON);
    }
}
