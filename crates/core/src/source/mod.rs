//! Source-system ports.

pub mod ports;

pub use ports::{PageRequest, RecordSource, SourceSystemApi};
