//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If a required variable is missing, falls back to a config file
//! 3. The file is `VECTORSYNC_CONFIG` if set, otherwise the first of the
//!    probed paths that exists
//! 4. Supports JSON and TOML formats
//!
//! Every loaded configuration is validated before it is returned.
//!
//! ## Environment Variables
//! Required:
//! - `VECTORSYNC_SOURCE_URL`, `VECTORSYNC_SOURCE_DATABASE`,
//!   `VECTORSYNC_SOURCE_USERNAME`, `VECTORSYNC_SOURCE_API_KEY`
//! - `VECTORSYNC_EMBEDDING_API_KEY`
//!
//! Optional (defaults otherwise):
//! - `VECTORSYNC_SOURCE_MODEL`
//! - `VECTORSYNC_VECTOR_URL`, `VECTORSYNC_VECTOR_API_KEY`, `VECTORSYNC_COLLECTION`
//! - `VECTORSYNC_EMBEDDING_URL`, `VECTORSYNC_EMBEDDING_MODEL`,
//!   `VECTORSYNC_EMBEDDING_DIMENSIONS`
//! - `VECTORSYNC_BATCH_SIZE`, `VECTORSYNC_INCREMENTAL_WINDOW_HOURS`,
//!   `VECTORSYNC_INCLUDE_ARCHIVED`
//! - `VECTORSYNC_LOG_LEVEL`, `VECTORSYNC_LOG_FORMAT` (`pretty` or `json`)
//!
//! ## File Locations
//! 1. `$VECTORSYNC_CONFIG`
//! 2. `./vectorsync.toml`, `./vectorsync.json`
//! 3. `./config/vectorsync.toml`, `./config/vectorsync.json`

use std::path::{Path, PathBuf};
use std::str::FromStr;

use vectorsync_domain::{AppConfig, IncrementalFallback, LogFormat, Result, VectorSyncError};

use crate::errors::InfraError;

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `VectorSyncError::Config` if neither source yields a valid
/// configuration.
pub fn load() -> Result<AppConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `VectorSyncError::Config` if a required variable is missing or
/// a value does not parse.
pub fn load_from_env() -> Result<AppConfig> {
    let mut config = AppConfig::default();

    config.source.url = env_var("VECTORSYNC_SOURCE_URL")?;
    config.source.database = env_var("VECTORSYNC_SOURCE_DATABASE")?;
    config.source.username = env_var("VECTORSYNC_SOURCE_USERNAME")?;
    config.source.api_key = env_var("VECTORSYNC_SOURCE_API_KEY")?;
    config.embedding.api_key = env_var("VECTORSYNC_EMBEDDING_API_KEY")?;

    if let Some(model) = env_opt("VECTORSYNC_SOURCE_MODEL") {
        config.source.model = model;
    }
    if let Some(url) = env_opt("VECTORSYNC_VECTOR_URL") {
        config.vector_store.url = url;
    }
    config.vector_store.api_key = env_opt("VECTORSYNC_VECTOR_API_KEY");
    if let Some(collection) = env_opt("VECTORSYNC_COLLECTION") {
        config.vector_store.collection = collection;
    }
    if let Some(url) = env_opt("VECTORSYNC_EMBEDDING_URL") {
        config.embedding.url = url;
    }
    if let Some(model) = env_opt("VECTORSYNC_EMBEDDING_MODEL") {
        config.embedding.model = model;
    }
    if let Some(dimensions) = env_parse("VECTORSYNC_EMBEDDING_DIMENSIONS")? {
        config.embedding.dimensions = dimensions;
    }
    if let Some(batch_size) = env_parse("VECTORSYNC_BATCH_SIZE")? {
        config.sync.batch_size = batch_size;
    }
    if let Some(hours) = env_parse("VECTORSYNC_INCREMENTAL_WINDOW_HOURS")? {
        config.sync.incremental_fallback = IncrementalFallback::WindowHours(hours);
    }
    config.sync.include_archived_in_incremental =
        env_bool("VECTORSYNC_INCLUDE_ARCHIVED", config.sync.include_archived_in_incremental);
    if let Some(level) = env_opt("VECTORSYNC_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = env_opt("VECTORSYNC_LOG_FORMAT") {
        config.logging.format = parse_log_format(&format)?;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, uses `VECTORSYNC_CONFIG` or [`probe_config_paths`].
///
/// # Errors
/// Returns `VectorSyncError::Config` if the file is missing, malformed, or
/// fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = match path.or_else(|| env_opt("VECTORSYNC_CONFIG").map(PathBuf::from)) {
        Some(p) => {
            if !p.exists() {
                return Err(VectorSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            VectorSyncError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(InfraError::from)?;
    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration, picking the format from the file extension.
fn parse_config(contents: &str, path: &Path) -> Result<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| InfraError::from(e).into()),
        "json" => serde_json::from_str(contents)
            .map_err(|e| VectorSyncError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(VectorSyncError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// First existing config file among the standard locations.
pub fn probe_config_paths() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    [
        cwd.join("vectorsync.toml"),
        cwd.join("vectorsync.json"),
        cwd.join("config").join("vectorsync.toml"),
        cwd.join("config").join("vectorsync.json"),
    ]
    .into_iter()
    .find(|path| path.exists())
}

fn parse_log_format(raw: &str) -> Result<LogFormat> {
    match raw.to_ascii_lowercase().as_str() {
        "pretty" | "text" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(VectorSyncError::Config(format!("Invalid log format: {}", other))),
    }
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        VectorSyncError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Non-empty environment variable, if set.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| VectorSyncError::Config(format!("Invalid {}: {}", key, e)))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
