//! Embedding provider adapters.

mod http;

pub use http::HttpEmbeddingClient;
