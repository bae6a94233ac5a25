//! Expiry and refresh timing, independent of capacity eviction.
//!
//! An entry's life is split into three windows measured from `created_at`:
//!
//! ```text
//! created_at        created_at + ttl * threshold%        expires_at
//!     |------- Fresh -------|------------ Stale ------------|--- Expired --->
//! ```

use std::time::{Duration, Instant};

/// Where an entry sits in its TTL window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Serve as-is.
    Fresh,
    /// Serve, and schedule a background refresh.
    Stale,
    /// Past `expires_at`; must not be served.
    Expired,
}

/// Creation and expiry instants for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryTiming {
    /// When the value was stored.
    pub created_at: Instant,
    /// `created_at + ttl`; never earlier than `created_at`.
    pub expires_at: Instant,
}

impl EntryTiming {
    /// Timing for a value stored at `now` with the given TTL.
    pub fn starting_at(now: Instant, ttl: Duration) -> Self {
        Self { created_at: now, expires_at: now.checked_add(ttl).unwrap_or(now) }
    }

    /// Length of the TTL window.
    pub fn ttl(&self) -> Duration {
        self.expires_at.saturating_duration_since(self.created_at)
    }

    /// Whether the entry is at or past its expiry.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Classifies the entry at `now` with a refresh threshold in percent.
    pub fn classify(&self, now: Instant, refresh_threshold_percent: u8) -> Freshness {
        if self.is_expired(now) {
            return Freshness::Expired;
        }
        let refresh_after = self.ttl().mul_f64(f64::from(refresh_threshold_percent) / 100.0);
        if now.saturating_duration_since(self.created_at) < refresh_after {
            Freshness::Fresh
        } else {
            Freshness::Stale
        }
    }
}
