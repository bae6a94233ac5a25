//! Cache configuration and builder.

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Configuration for a [`RefreshableCache`](super::RefreshableCache).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Capacity bound; the least recently used entry is evicted on overflow.
    pub max_entries: NonZeroUsize,

    /// TTL applied by [`set`](super::RefreshableCache::set).
    pub default_ttl: Duration,

    /// Share of the TTL after which a read schedules a background refresh.
    pub refresh_threshold_percent: u8,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: NonZeroUsize::new(500).unwrap_or(NonZeroUsize::MIN),
            default_ttl: Duration::from_secs(300),
            refresh_threshold_percent: 80,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration builder.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_ttl.is_zero() {
            return Err(ConfigError::invalid("default_ttl must be greater than 0"));
        }
        if self.refresh_threshold_percent == 0 || self.refresh_threshold_percent > 100 {
            return Err(ConfigError::invalid("refresh_threshold_percent must be within 1..=100"));
        }
        Ok(())
    }
}

/// Builder for [`CacheConfig`].
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
    max_entries: Option<usize>,
}

impl CacheConfigBuilder {
    /// Sets the capacity bound.
    #[must_use]
    pub const fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    /// Sets the TTL used by plain `set`.
    #[must_use]
    pub const fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = ttl;
        self
    }

    /// Sets the refresh threshold as a percentage of the TTL.
    #[must_use]
    pub const fn refresh_threshold_percent(mut self, percent: u8) -> Self {
        self.config.refresh_threshold_percent = percent;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(mut self) -> ConfigResult<CacheConfig> {
        if let Some(max) = self.max_entries {
            self.config.max_entries = NonZeroUsize::new(max)
                .ok_or_else(|| ConfigError::invalid("max_entries must be greater than 0"))?;
        }
        self.config.validate()?;
        Ok(self.config)
    }
}
