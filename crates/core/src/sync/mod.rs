//! Sync pipeline: batching, embedding text, progress and the orchestrator.

pub mod document;
pub mod orchestrator;
pub mod progress;

pub use document::{build_embedding_text, build_vector_record, strip_markup};
pub use orchestrator::SyncOrchestrator;
pub use progress::ProgressCallback;
