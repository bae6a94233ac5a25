//! Vector store adapters and the breaker-guarded gateway.

pub mod gateway;
pub mod memory;
pub mod qdrant;

pub use gateway::{build_filter, VectorGateway};
pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantClient;
