//! Bounded stale-while-revalidate cache.
//!
//! Two independent policies share one entry store:
//!
//! - **Capacity** ([`store::LruStore`]): at most `max_entries` keys, least
//!   recently used evicted on overflow.
//! - **Timing** ([`policy::EntryTiming`]): each entry is fresh, stale or
//!   expired relative to its own TTL and the refresh threshold.
//!
//! [`RefreshableCache::get_with_refresh`] combines them: fresh entries are
//! served, stale entries are served while one background refresh per key
//! runs, and expired or missing entries are loaded inline.
//!
//! ```
//! use std::time::Duration;
//!
//! use vectorsync_common::cache::{CacheConfig, RefreshableCache};
//!
//! let config = CacheConfig::builder()
//!     .max_entries(100)
//!     .default_ttl(Duration::from_secs(300))
//!     .build()
//!     .unwrap();
//! let cache: RefreshableCache<String, Vec<u8>> = RefreshableCache::new(config);
//! cache.set("k".to_string(), vec![1, 2, 3]);
//! assert_eq!(cache.stats().size, 1);
//! ```

pub mod config;
pub mod policy;
pub mod refreshable;
pub mod stats;
pub mod store;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use policy::{EntryTiming, Freshness};
pub use refreshable::RefreshableCache;
pub use stats::CacheStats;
pub use store::LruStore;
