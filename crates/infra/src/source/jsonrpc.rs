//! JSON-RPC transport for the source system.
//!
//! Every call is a `POST {url}/jsonrpc` envelope naming a service
//! (`common` or `object`) and a method. Errors come back inside a 200
//! response under `error`, so status checks alone are not enough.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};
use vectorsync_core::{PageRequest, SourceSystemApi};
use vectorsync_domain::{RecordFilter, Result, SourceConfig, VectorSyncError};

use super::wire::encode_filter;
use crate::http::HttpClient;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<RpcErrorData>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorData {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
}

impl RpcError {
    fn into_domain(self) -> VectorSyncError {
        let (name, detail) = match self.data {
            Some(data) => (data.name, data.message),
            None => (String::new(), String::new()),
        };
        let message = if detail.is_empty() { self.message } else { detail };
        if name.contains("AccessDenied") || name.contains("AccessError") {
            VectorSyncError::Authentication(message)
        } else {
            VectorSyncError::Remote(message)
        }
    }
}

/// Source-system client speaking JSON-RPC over [`HttpClient`].
pub struct JsonRpcSourceApi {
    http: HttpClient,
    endpoint: String,
    config: SourceConfig,
    next_id: AtomicU64,
}

impl JsonRpcSourceApi {
    /// Build a client for `config`, retrying a transient failure once.
    pub fn new(config: SourceConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .service("source")
            .timeout(config.timeouts.bulk())
            .max_attempts(2)
            .base_backoff(Duration::from_millis(250))
            .build()?;
        Ok(Self::with_http_client(config, http))
    }

    pub fn with_http_client(config: SourceConfig, http: HttpClient) -> Self {
        let endpoint = format!("{}/jsonrpc", config.url.trim_end_matches('/'));
        Self { http, endpoint, config, next_id: AtomicU64::new(1) }
    }

    async fn call(&self, service: &str, method: &str, args: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": { "service": service, "method": method, "args": args },
            "id": id,
        });
        debug!(id, service, method, "source rpc call");

        let request = self.http.request(Method::POST, &self.endpoint).json(&body);
        let response: RpcResponse = self.http.send_json(request).await?;

        if let Some(error) = response.error {
            let err = error.into_domain();
            warn!(service, method, error = %err, "source rpc returned an error");
            return Err(err);
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn execute_kw(
        &self,
        session: i64,
        model: &str,
        method: &str,
        positional: Value,
        keywords: Value,
    ) -> Result<Value> {
        self.call(
            "object",
            "execute_kw",
            json!([
                self.config.database,
                session,
                self.config.api_key,
                model,
                method,
                positional,
                keywords
            ]),
        )
        .await
    }
}

#[async_trait]
impl SourceSystemApi for JsonRpcSourceApi {
    #[instrument(skip(self), fields(user = %self.config.username))]
    async fn authenticate(&self) -> Result<i64> {
        let result = self
            .call(
                "common",
                "authenticate",
                json!([self.config.database, self.config.username, self.config.api_key, {}]),
            )
            .await?;

        // A rejected login is `false`, not an RPC error.
        result.as_i64().filter(|uid| *uid > 0).ok_or_else(|| {
            VectorSyncError::Authentication(format!(
                "credentials rejected for user '{}'",
                self.config.username
            ))
        })
    }

    async fn search_read(
        &self,
        session: i64,
        model: &str,
        filter: &RecordFilter,
        fields: &[&str],
        page: &PageRequest,
    ) -> Result<Vec<Value>> {
        let mut keywords = json!({ "fields": fields, "offset": page.offset, "limit": page.limit });
        if let Some(order) = &page.order {
            keywords["order"] = json!(order);
        }
        let result = self
            .execute_kw(session, model, "search_read", json!([encode_filter(filter)]), keywords)
            .await?;

        match result {
            Value::Array(rows) => Ok(rows),
            other => Err(VectorSyncError::Remote(format!("search_read returned {other}"))),
        }
    }

    async fn search_count(&self, session: i64, model: &str, filter: &RecordFilter) -> Result<usize> {
        let result = self
            .execute_kw(session, model, "search_count", json!([encode_filter(filter)]), json!({}))
            .await?;
        result
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| VectorSyncError::Remote(format!("search_count returned {result}")))
    }

    async fn ping(&self) -> Result<bool> {
        match self.call("common", "version", json!([])).await {
            Ok(_) => Ok(true),
            Err(VectorSyncError::Network(msg)) => {
                warn!(error = %msg, "source health check failed: network error");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}
