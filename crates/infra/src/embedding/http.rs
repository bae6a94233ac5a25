//! Embedding provider over an OpenAI-style `/embeddings` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vectorsync_core::EmbeddingProvider;
use vectorsync_domain::{EmbeddingConfig, InputType, Result, VectorSyncError};

use crate::http::{HttpClient, RetryPolicy};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    input_type: InputType,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Remote embedding client.
pub struct HttpEmbeddingClient {
    http_client: HttpClient,
    api_key: String,
    model: String,
    api_url: String,
    dimensions: usize,
}

impl HttpEmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        // Providers rate limit aggressively; wait out their Retry-After hints.
        let http_client = HttpClient::builder()
            .service("embedding")
            .timeout(Duration::from_secs(config.timeout_secs))
            .retry(RetryPolicy {
                max_attempts: 4,
                base_backoff: Duration::from_millis(500),
                max_backoff: Duration::from_secs(20),
            })
            .build()?;
        Ok(Self::with_http_client(config, http_client))
    }

    pub fn with_http_client(config: &EmbeddingConfig, http_client: HttpClient) -> Self {
        Self {
            http_client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            api_url: config.url.clone(),
            dimensions: config.dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn is_available(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn embed_batch(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if !self.is_available() {
            return Err(VectorSyncError::Embedding("embedding API key is not configured".into()));
        }

        debug!(count = texts.len(), model = %self.model, "requesting embeddings");
        let request = self
            .http_client
            .request(Method::POST, &self.api_url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest { model: &self.model, input: texts, input_type });
        let mut response: EmbeddingResponse = self.http_client.send_json(request).await?;

        if response.data.len() != texts.len() {
            return Err(VectorSyncError::Embedding(format!(
                "expected {} embeddings, received {}",
                texts.len(),
                response.data.len()
            )));
        }
        response.data.sort_by_key(|item| item.index);

        let vectors: Vec<Vec<f32>> = response.data.into_iter().map(|item| item.embedding).collect();
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(VectorSyncError::Embedding(format!(
                "expected {} dimensions, received {}",
                self.dimensions,
                bad.len()
            )));
        }

        info!(count = vectors.len(), "embeddings received");
        Ok(vectors)
    }
}
