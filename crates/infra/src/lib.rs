//! # vectorsync Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - The retrying HTTP client every adapter shares
//! - The source-system JSON-RPC client and [`ResilientClient`]
//! - Vector store adapters (REST and in-memory) and [`VectorGateway`]
//! - The HTTP embedding client
//! - Configuration loading and logging setup
//!
//! ## Architecture
//! - Implements traits defined in `vectorsync-core`
//! - Depends on `vectorsync-common` (resilience, cache) and `vectorsync-domain`
//! - Contains all "impure" code (network I/O, environment, files)

pub mod config;
pub mod embedding;
pub mod errors;
pub mod http;
pub mod observability;
pub mod source;
pub mod vector;

// Re-export commonly used items
pub use embedding::HttpEmbeddingClient;
pub use http::{HttpClient, HttpClientBuilder, RetryPolicy};
pub use observability::init_logging;
pub use source::{JsonRpcSourceApi, ResilientClient};
pub use vector::{InMemoryVectorStore, QdrantClient, VectorGateway};
