//! Process-wide `tracing` subscriber setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use vectorsync_domain::{LogFormat, LoggingConfig};

/// Filter from `RUST_LOG`, falling back to the configured level.
fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed, which leaves the
/// existing one in place.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter(config));
    let installed = match config.format {
        LogFormat::Pretty => {
            registry.with(fmt::layer().with_target(true).with_writer(std::io::stderr)).try_init()
        }
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_writer(std::io::stderr))
            .try_init(),
    };
    installed.is_ok()
}
