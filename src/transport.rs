//! Resilient HTTP transport for the RenderScreenshot API
//!
//! Every logical call goes through [`HttpTransport::execute`], which applies
//! authentication headers and the per-attempt timeout, classifies failures
//! into [`ApiError`]s and retries transient ones according to the configured
//! [`RetryPolicy`]. Retries are strictly sequential and sleep for the
//! computed delay; dropping the returned future cancels the call, sleep
//! included.

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::metrics::TransportMetrics;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER, USER_AGENT,
};
use reqwest::{Client, Method};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Query parameters appended to the request URL.
pub type Params = BTreeMap<String, String>;

/// Extra request headers. Entries replace default headers of the same name.
pub type Headers = BTreeMap<String, String>;

/// Parsed JSON object returned by JSON calls.
pub type JsonMap = Map<String, Value>;

/// Identifies the SDK on every request.
pub const SDK_USER_AGENT: &str = concat!("renderscreenshot-rust/", env!("CARGO_PKG_VERSION"));

/// Raw response body plus headers, as returned by binary calls.
#[derive(Debug, Clone, Default)]
pub struct BinaryResponse {
    pub body: Vec<u8>,
    pub headers: HeaderMap,
}

impl BinaryResponse {
    /// First value of `name`, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The HTTP operations higher-level API methods are built on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str, query: &Params, headers: &Headers) -> Result<JsonMap>;

    async fn get_binary(&self, path: &str, query: &Params, headers: &Headers)
        -> Result<BinaryResponse>;

    async fn post(&self, path: &str, body: &Value, headers: &Headers) -> Result<JsonMap>;

    async fn post_binary(&self, path: &str, body: &Value, headers: &Headers)
        -> Result<BinaryResponse>;

    async fn delete(&self, path: &str, query: &Params, headers: &Headers) -> Result<JsonMap>;
}

/// `reqwest`-backed transport. Cheap to share: the inner client is a
/// connection pool safe for concurrent use.
pub struct HttpTransport {
    client: Client,
    api_key: String,
    base_url: String,
    retry_policy: RetryPolicy,
    metrics: TransportMetrics,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

struct Call<'a> {
    method: Method,
    path: &'a str,
    query: Option<&'a Params>,
    body: Option<&'a Value>,
    headers: &'a Headers,
}

impl HttpTransport {
    pub fn new(api_key: impl Into<String>, config: &ClientConfig) -> Result<Self> {
        let base_url = config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ApiError::connection)?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url,
            retry_policy: RetryPolicy::new(config.max_retries, config.retry_delay),
            metrics: TransportMetrics::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    async fn request_json(&self, call: Call<'_>) -> Result<JsonMap> {
        let (body, _) = self.execute(&call).await?;
        Ok(decode_json_body(&body))
    }

    async fn request_binary(&self, call: Call<'_>) -> Result<BinaryResponse> {
        let (body, headers) = self.execute(&call).await?;
        Ok(BinaryResponse { body, headers })
    }

    /// Runs one logical call, retrying transient failures.
    async fn execute(&self, call: &Call<'_>) -> Result<(Vec<u8>, HeaderMap)> {
        let mut attempt = 0;

        loop {
            debug!(method = %call.method, path = call.path, attempt, "sending request");

            let started = Instant::now();
            let outcome = self.send_once(call).await;
            self.metrics.record_attempt(started.elapsed());

            let error = match outcome {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };
            self.metrics.record_error(&error);

            if !self.retry_policy.should_retry(&error, attempt) {
                if error.is_retryable() && attempt > 0 {
                    warn!(
                        method = %call.method,
                        path = call.path,
                        attempts = attempt + 1,
                        "giving up after retries: {error}"
                    );
                }
                return Err(error);
            }

            let delay = self.retry_policy.delay_for(&error, attempt);
            debug!(
                method = %call.method,
                path = call.path,
                attempt,
                ?delay,
                "retrying after transient error: {error}"
            );
            self.metrics.record_retry();
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// One HTTP round trip, with the outcome classified.
    async fn send_once(&self, call: &Call<'_>) -> Result<(Vec<u8>, HeaderMap)> {
        let url = format!("{}{}", self.base_url, call.path);
        let mut request = self
            .client
            .request(call.method.clone(), url)
            .headers(self.build_headers(call)?);

        if let Some(query) = call.query.filter(|q| !q.is_empty()) {
            request = request.query(query);
        }
        if let Some(body) = call.body {
            request = request.body(body.to_string());
        }

        let response = request.send().await.map_err(classify_send_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::connection(format!("failed to read response body: {e}")))?;

        if status.as_u16() >= 400 {
            let parsed = serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);
            return Err(ApiError::from_response(
                status.as_u16(),
                &parsed,
                header_str(&headers, RETRY_AFTER.as_str()),
                header_str(&headers, "x-request-id"),
            ));
        }

        Ok((body.to_vec(), headers))
    }

    fn build_headers(&self, call: &Call<'_>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| ApiError::invalid_request("API key contains invalid characters", 0))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(USER_AGENT, HeaderValue::from_static(SDK_USER_AGENT));
        if call.body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        for (name, value) in call.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ApiError::invalid_request(format!("invalid header name {name:?}"), 0)
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                ApiError::invalid_request(format!("invalid value for header {name}"), 0)
            })?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, query: &Params, headers: &Headers) -> Result<JsonMap> {
        self.request_json(Call {
            method: Method::GET,
            path,
            query: Some(query),
            body: None,
            headers,
        })
        .await
    }

    async fn get_binary(
        &self,
        path: &str,
        query: &Params,
        headers: &Headers,
    ) -> Result<BinaryResponse> {
        self.request_binary(Call {
            method: Method::GET,
            path,
            query: Some(query),
            body: None,
            headers,
        })
        .await
    }

    async fn post(&self, path: &str, body: &Value, headers: &Headers) -> Result<JsonMap> {
        self.request_json(Call {
            method: Method::POST,
            path,
            query: None,
            body: Some(body),
            headers,
        })
        .await
    }

    async fn post_binary(
        &self,
        path: &str,
        body: &Value,
        headers: &Headers,
    ) -> Result<BinaryResponse> {
        self.request_binary(Call {
            method: Method::POST,
            path,
            query: None,
            body: Some(body),
            headers,
        })
        .await
    }

    async fn delete(&self, path: &str, query: &Params, headers: &Headers) -> Result<JsonMap> {
        self.request_json(Call {
            method: Method::DELETE,
            path,
            query: Some(query),
            body: None,
            headers,
        })
        .await
    }
}

/// Network-level failures: deadline conditions become `timeout` (408),
/// everything else `connection_error` (0).
fn classify_send_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::timeout()
    } else {
        ApiError::connection(error)
    }
}

/// Success bodies never fail to decode: empty is `{}`, and anything that is
/// not a JSON object comes back as `{"body": <raw text>}`.
fn decode_json_body(body: &[u8]) -> JsonMap {
    if body.is_empty() {
        return JsonMap::new();
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => {
            let mut map = JsonMap::new();
            map.insert(
                "body".to_string(),
                Value::String(String::from_utf8_lossy(body).into_owned()),
            );
            map
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
