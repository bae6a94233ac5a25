//! Port interface for the embedding collaborator

use async_trait::async_trait;
use vectorsync_domain::{InputType, Result};

/// Turns texts into fixed-dimensionality vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    /// Whether the provider is configured and usable.
    fn is_available(&self) -> bool;

    /// One vector per input text, in input order.
    async fn embed_batch(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>>;
}
