//! Embedding port.

pub mod ports;

pub use ports::EmbeddingProvider;
