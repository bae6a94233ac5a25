//! Application configuration.
//!
//! Every section has a `Default`, and every field is `#[serde(default)]`, so
//! a config file only needs to name what it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, VectorSyncError};
use crate::types::Distance;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub vector_store: VectorStoreConfig,
    pub embedding: EmbeddingConfig,
    pub sync: SyncConfig,
    pub cache: CacheSettings,
    pub breakers: BreakerSettings,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Rejects values that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(VectorSyncError::Config(msg.to_string()));
        if self.sync.batch_size == 0 {
            return invalid("sync.batch_size must be greater than 0");
        }
        if self.embedding.dimensions == 0 {
            return invalid("embedding.dimensions must be greater than 0");
        }
        if self.cache.max_entries == 0 {
            return invalid("cache.max_entries must be greater than 0");
        }
        if !(1..=100).contains(&self.cache.refresh_threshold_percent) {
            return invalid("cache.refresh_threshold_percent must be within 1..=100");
        }
        for (name, breaker) in
            [("source", &self.breakers.source), ("vector_store", &self.breakers.vector_store)]
        {
            if breaker.failure_threshold == 0 || breaker.reset_timeout_secs == 0 {
                return Err(VectorSyncError::Config(format!(
                    "breakers.{name} thresholds must be greater than 0"
                )));
            }
        }
        Ok(())
    }
}

/// Per-call time bounds for the source system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub interactive_secs: u64,
    pub bulk_secs: u64,
    pub health_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self { interactive_secs: 30, bulk_secs: 60, health_secs: 5 }
    }
}

impl TimeoutSettings {
    pub const fn interactive(&self) -> Duration {
        Duration::from_secs(self.interactive_secs)
    }

    pub const fn bulk(&self) -> Duration {
        Duration::from_secs(self.bulk_secs)
    }

    pub const fn health(&self) -> Duration {
        Duration::from_secs(self.health_secs)
    }
}

/// Source-system connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub database: String,
    pub username: String,
    pub api_key: String,
    /// Model holding the records to index.
    pub model: String,
    pub timeouts: TimeoutSettings,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8069".to_string(),
            database: String::new(),
            username: String::new(),
            api_key: String::new(),
            model: "crm.lead".to_string(),
            timeouts: TimeoutSettings::default(),
        }
    }
}

/// Vector store connection and collection layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub distance: Distance,
    pub hnsw_m: u32,
    pub hnsw_ef_construct: u32,
    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            api_key: None,
            collection: "records".to_string(),
            distance: Distance::Cosine,
            hnsw_m: 16,
            hnsw_ef_construct: 100,
            timeout_secs: 30,
        }
    }
}

/// Embedding provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: "https://api.voyageai.com/v1/embeddings".to_string(),
            api_key: String::new(),
            model: "voyage-3".to_string(),
            dimensions: 1024,
            timeout_secs: 60,
        }
    }
}

/// What an incremental sync looks back to when neither an explicit `since`
/// nor a previous successful sync time is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IncrementalFallback {
    /// Start from the epoch, re-processing every record.
    #[default]
    FullHistory,
    /// Only look back this many hours from now.
    WindowHours(u32),
}

/// Sync pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub batch_size: usize,
    pub incremental_fallback: IncrementalFallback,
    /// Fetch archived records during incremental sync so their vectors can
    /// be deleted.
    pub include_archived_in_incremental: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            incremental_fallback: IncrementalFallback::FullHistory,
            include_archived_in_incremental: true,
        }
    }
}

/// Reference-data cache sizing and per-table TTLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_entries: usize,
    pub refresh_threshold_percent: u8,
    pub stages_ttl_secs: u64,
    pub teams_ttl_secs: u64,
    pub salespeople_ttl_secs: u64,
    pub tags_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 500,
            refresh_threshold_percent: 80,
            stages_ttl_secs: 30 * 60,
            teams_ttl_secs: 60 * 60,
            salespeople_ttl_secs: 10 * 60,
            tags_ttl_secs: 5 * 60,
        }
    }
}

/// Breaker thresholds for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout_secs: 60 }
    }
}

/// One breaker per protected endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BreakerSettings {
    pub source: BreakerConfig,
    pub vector_store: BreakerConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging settings; `RUST_LOG` overrides `level` when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}
