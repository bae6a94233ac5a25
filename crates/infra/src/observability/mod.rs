//! Logging setup for binaries and integration tests.

pub mod logging;

pub use logging::init_logging;
