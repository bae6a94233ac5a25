//! REST client for a Qdrant-compatible vector store.
//!
//! Point ids on the wire are UUIDv5 values derived from our string ids, as
//! the store only accepts integers or UUIDs. The string id is recovered from
//! the payload's `source_id` on the way back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use vectorsync_core::VectorStoreApi;
use vectorsync_domain::{
    CollectionInfo, CollectionSpec, Distance, FieldCondition, RecordPayload, Result, VectorFilter,
    VectorMatch, VectorRecord, VectorStoreConfig, VectorSyncError,
};

use crate::http::HttpClient;

/// Deterministic wire id for a string point id.
pub fn point_uuid(id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes())
}

//==============================================================================
// Wire types
//==============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Serialize)]
struct WirePoint<'a> {
    id: Uuid,
    vector: &'a [f32],
    payload: &'a RecordPayload,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<RecordPayload>,
}

#[derive(Debug, Deserialize)]
struct StoredPoint {
    id: Value,
    #[serde(default)]
    payload: Option<RecordPayload>,
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct WireCollectionInfo {
    #[serde(default)]
    status: String,
    #[serde(default)]
    points_count: Option<u64>,
    #[serde(default)]
    indexed_vectors_count: Option<u64>,
    #[serde(default)]
    segments_count: u64,
    #[serde(default)]
    config: Value,
}

const fn distance_name(distance: Distance) -> &'static str {
    match distance {
        Distance::Cosine => "Cosine",
        Distance::Dot => "Dot",
        Distance::Euclid => "Euclid",
    }
}

fn condition_json(condition: &FieldCondition) -> Value {
    match condition {
        FieldCondition::Match { key, value } => json!({ "key": key, "match": { "value": value } }),
        FieldCondition::MatchAny { key, values } => json!({ "key": key, "match": { "any": values } }),
        FieldCondition::Range { key, gte, lte } => {
            let mut range = serde_json::Map::new();
            if let Some(gte) = gte {
                range.insert("gte".into(), json!(gte));
            }
            if let Some(lte) = lte {
                range.insert("lte".into(), json!(lte));
            }
            json!({ "key": key, "range": range })
        }
    }
}

/// Encode a filter into the store's `must`/`must_not` JSON.
pub fn filter_json(filter: &VectorFilter) -> Value {
    let mut out = serde_json::Map::new();
    if !filter.must.is_empty() {
        out.insert("must".into(), filter.must.iter().map(condition_json).collect());
    }
    if !filter.must_not.is_empty() {
        out.insert("must_not".into(), filter.must_not.iter().map(condition_json).collect());
    }
    Value::Object(out)
}

/// Our string id for a returned point, preferring the payload.
fn point_id(wire_id: &Value, payload: Option<&RecordPayload>) -> String {
    match payload {
        Some(payload) => VectorRecord::id_for(payload.source_id),
        None => match wire_id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}

//==============================================================================
// Client
//==============================================================================

/// Vector store client over the REST API.
pub struct QdrantClient {
    http: HttpClient,
    base_url: String,
}

impl QdrantClient {
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|_| VectorSyncError::Config("vector_store.api_key is not a valid header".into()))?;
            headers.insert("api-key", value);
        }
        let http = HttpClient::builder()
            .service("qdrant")
            .timeout(Duration::from_secs(config.timeout_secs))
            .max_attempts(2)
            .default_headers(headers)
            .build()?;
        Ok(Self::with_http_client(&config.url, http))
    }

    pub fn with_http_client(base_url: &str, http: HttpClient) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_string() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let request = self.http.request(Method::GET, self.url(&format!("/collections/{collection}")));
        match self.http.send_json::<Value>(request).await {
            Ok(_) => Ok(true),
            Err(VectorSyncError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl VectorStoreApi for QdrantClient {
    #[instrument(skip(self, spec), fields(collection = %spec.name, dimensions = spec.dimensions))]
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<bool> {
        if self.collection_exists(&spec.name).await? {
            debug!("collection already exists");
            return Ok(false);
        }

        let body = json!({
            "vectors": { "size": spec.dimensions, "distance": distance_name(spec.distance) },
            "hnsw_config": { "m": spec.index.m, "ef_construct": spec.index.ef_construct },
        });
        let request = self
            .http
            .request(Method::PUT, self.url(&format!("/collections/{}", spec.name)))
            .json(&body);
        let _: Value = self.http.send_json(request).await?;
        info!("collection created");
        Ok(true)
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<usize> {
        let points: Vec<WirePoint<'_>> = records
            .iter()
            .map(|r| WirePoint { id: point_uuid(&r.id), vector: &r.values, payload: &r.metadata })
            .collect();
        let request = self
            .http
            .request(Method::PUT, self.url(&format!("/collections/{collection}/points?wait=true")))
            .json(&json!({ "points": points }));
        let _: Value = self.http.send_json(request).await?;
        Ok(records.len())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()> {
        let points: Vec<Uuid> = ids.iter().map(|id| point_uuid(id)).collect();
        let request = self
            .http
            .request(
                Method::POST,
                self.url(&format!("/collections/{collection}/points/delete?wait=true")),
            )
            .json(&json!({ "points": points }));
        let _: Value = self.http.send_json(request).await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&VectorFilter>,
        score_threshold: Option<f32>,
    ) -> Result<Vec<VectorMatch>> {
        let mut body = json!({ "vector": vector, "limit": top_k, "with_payload": true });
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            body["filter"] = filter_json(filter);
        }
        if let Some(threshold) = score_threshold {
            body["score_threshold"] = json!(threshold);
        }
        let request = self
            .http
            .request(Method::POST, self.url(&format!("/collections/{collection}/points/search")))
            .json(&body);
        let response: Envelope<Vec<ScoredPoint>> = self.http.send_json(request).await?;

        Ok(response
            .result
            .into_iter()
            .map(|p| VectorMatch { id: point_id(&p.id, p.payload.as_ref()), score: p.score, payload: p.payload })
            .collect())
    }

    async fn retrieve(&self, collection: &str, ids: &[String]) -> Result<Vec<VectorRecord>> {
        let wire_ids: Vec<Uuid> = ids.iter().map(|id| point_uuid(id)).collect();
        let request = self
            .http
            .request(Method::POST, self.url(&format!("/collections/{collection}/points")))
            .json(&json!({ "ids": wire_ids, "with_payload": true, "with_vector": true }));
        let response: Envelope<Vec<StoredPoint>> = self.http.send_json(request).await?;

        let mut records = Vec::with_capacity(response.result.len());
        for point in response.result {
            match (point.payload, point.vector) {
                (Some(metadata), Some(values)) => records.push(VectorRecord {
                    id: VectorRecord::id_for(metadata.source_id),
                    values,
                    metadata,
                }),
                _ => warn!(id = %point.id, "stored point without payload or vector skipped"),
            }
        }
        Ok(records)
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo> {
        let request = self.http.request(Method::GET, self.url(&format!("/collections/{collection}")));
        let response: Envelope<WireCollectionInfo> = self.http.send_json(request).await?;
        let info = response.result;
        let dimensions = info
            .config
            .pointer("/params/vectors/size")
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or_default();

        Ok(CollectionInfo {
            name: collection.to_string(),
            status: info.status,
            points_count: info.points_count.unwrap_or_default(),
            indexed_vectors_count: info.indexed_vectors_count.unwrap_or_default(),
            segments_count: info.segments_count,
            dimensions,
        })
    }

    async fn health(&self) -> Result<bool> {
        let request = self.http.request(Method::GET, self.url("/healthz"));
        match self.http.send(request).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_transient() => Err(err),
            Err(err) => {
                warn!(error = %err, "qdrant health endpoint rejected the probe");
                Ok(false)
            }
        }
    }
}
