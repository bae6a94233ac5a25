//! # VectorSync Core
//!
//! Sync business logic with no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces for the source system, the embedding provider and the
//!   vector store
//! - Embedding-text and payload construction
//! - The sync orchestrator
//!
//! ## Architecture Principles
//! - Only depends on `vectorsync-domain`
//! - No HTTP or storage code
//! - All external collaborators reached through traits

pub mod embedding;
pub mod source;
pub mod sync;
pub mod vector;

pub use embedding::EmbeddingProvider;
pub use source::{PageRequest, RecordSource, SourceSystemApi};
pub use sync::{ProgressCallback, SyncOrchestrator};
pub use vector::{VectorSink, VectorStoreApi};
