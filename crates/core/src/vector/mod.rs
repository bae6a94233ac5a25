//! Vector store ports.

pub mod ports;

pub use ports::{VectorSink, VectorStoreApi};
