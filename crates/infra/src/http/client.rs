//! HTTP transport shared by the source, embedding and vector store adapters.
//!
//! Every adapter talks JSON over HTTP and wants the same treatment of
//! failures: non-2xx statuses become [`VectorSyncError`] values through
//! [`status_error`], and a request is retried only while that error is
//! transient. Each adapter sets its own [`RetryPolicy`]; the circuit breakers
//! above this layer see one error per exhausted request.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use vectorsync_domain::{Result, VectorSyncError};

use crate::errors::{status_error, InfraError};

/// Retry budget for one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Never below 1.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_backoff: Duration,
    /// Upper bound on any single delay, including server `Retry-After` hints.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub const fn none() -> Self {
        Self { max_attempts: 1, base_backoff: Duration::ZERO, max_backoff: Duration::ZERO }
    }

    /// Delay before retry number `retry` (1-based). A server hint wins over
    /// the computed backoff when it is longer; both are capped.
    fn delay(&self, retry: u32, hint: Option<Duration>) -> Duration {
        let backoff = self.base_backoff.saturating_mul(1u32 << retry.saturating_sub(1).min(8));
        hint.map_or(backoff, |hint| hint.max(backoff)).min(self.max_backoff)
    }
}

/// JSON-over-HTTP client with status mapping and transient-error retries.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    service: Arc<str>,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Name used in log lines.
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn request<U: reqwest::IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Sends `builder` and returns the response if its status is 2xx.
    ///
    /// Transport failures and non-2xx statuses are mapped to domain errors;
    /// the request is retried while the mapped error is transient and the
    /// retry budget lasts. Requests with a streaming body cannot be retried.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let mut attempt = 1;
        loop {
            let request = builder
                .try_clone()
                .ok_or_else(|| VectorSyncError::Internal("request body is not replayable".into()))?
                .build()
                .map_err(InfraError::from)?;
            let method = request.method().clone();
            let url = request.url().clone();
            debug!(service = %self.service, attempt, %method, %url, "sending request");

            let (err, hint) = match self.client.execute(request).await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let hint = retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    (status_error(status, &body), hint)
                }
                Err(err) => (InfraError::from(err).0, None),
            };

            if !err.is_transient() || attempt >= self.retry.max_attempts {
                debug!(service = %self.service, attempt, %method, %url, error = %err, "request failed");
                return Err(err);
            }

            let delay = self.retry.delay(attempt, hint);
            warn!(
                service = %self.service,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "transient failure, retrying"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    /// [`send`](Self::send), then decode the JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.send(builder).await?;
        response.json::<T>().await.map_err(|err| InfraError::from(err).into())
    }
}

/// `Retry-After` in its delay-seconds form; HTTP dates are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs))
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    service: String,
    timeout: Duration,
    retry: RetryPolicy,
    default_headers: HeaderMap,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            service: "http".to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            default_headers: HeaderMap::new(),
        }
    }
}

impl HttpClientBuilder {
    pub fn service(mut self, name: impl Into<String>) -> Self {
        self.service = name.into();
        self
    }

    /// Per-attempt transport timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Total attempts, the first one included.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.retry.max_attempts = attempts;
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.retry.base_backoff = backoff;
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(concat!("vectorsync/", env!("CARGO_PKG_VERSION")))
            .default_headers(self.default_headers)
            .no_proxy()
            .build()
            .map_err(InfraError::from)?;

        Ok(HttpClient {
            client,
            service: Arc::from(self.service),
            retry: RetryPolicy { max_attempts: self.retry.max_attempts.max(1), ..self.retry },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::Deserialize;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Status {
        status: String,
    }

    fn client(attempts: u32) -> HttpClient {
        HttpClient::builder()
            .service("test")
            .retry(RetryPolicy {
                max_attempts: attempts,
                base_backoff: Duration::from_millis(5),
                max_backoff: Duration::from_millis(50),
            })
            .build()
            .expect("http client")
    }

    /// Responds with each status in turn, then 200 with a JSON body.
    fn scripted(statuses: &'static [u16]) -> (Arc<AtomicUsize>, impl Fn(&Request) -> ResponseTemplate) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let responder = move |_: &Request| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            match statuses.get(n) {
                Some(code) => ResponseTemplate::new(*code).set_body_string("busy"),
                None => ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "green"})),
            }
        };
        (calls, responder)
    }

    #[test]
    fn retry_delay_doubles_and_honours_capped_hint() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        };
        assert_eq!(policy.delay(1, None), Duration::from_millis(100));
        assert_eq!(policy.delay(3, None), Duration::from_millis(400));
        assert_eq!(policy.delay(1, Some(Duration::from_secs(1))), Duration::from_secs(1));
        assert_eq!(policy.delay(1, Some(Duration::from_secs(30))), Duration::from_secs(2));
        assert_eq!(policy.delay(8, None), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn rate_limited_request_is_retried_until_success() {
        let server = MockServer::start().await;
        let (calls, responder) = scripted(&[429, 503]);
        Mock::given(method("GET")).respond_with(responder).mount(&server).await;

        let http = client(3);
        let body: Status =
            http.send_json(http.request(Method::GET, server.uri())).await.expect("decoded");

        assert_eq!(body.status, "green");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_returns_last_transient_error() {
        let server = MockServer::start().await;
        let (calls, responder) = scripted(&[502, 502, 502]);
        Mock::given(method("GET")).respond_with(responder).mount(&server).await;

        let http = client(2);
        let err = http.send(http.request(Method::GET, server.uri())).await.expect_err("502");

        assert!(matches!(err, VectorSyncError::Network(msg) if msg.contains("502")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_statuses_fail_on_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/denied"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let http = client(3);
        let denied = http
            .send_json::<Status>(http.request(Method::GET, format!("{}/denied", server.uri())))
            .await
            .expect_err("403");
        assert!(matches!(denied, VectorSyncError::Authentication(msg) if msg.contains("bad key")));

        let missing =
            http.send(http.request(Method::GET, format!("{}/missing", server.uri()))).await;
        assert!(matches!(missing, Err(VectorSyncError::NotFound(_))));
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let http = client(2);
        let err = http
            .send(http.request(Method::GET, format!("http://{addr}")))
            .await
            .expect_err("nothing listening");
        assert!(err.is_transient(), "got {err:?}");
    }
}
