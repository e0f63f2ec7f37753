//! High-level RenderScreenshot API client
//!
//! [`Client`] maps each API operation onto the [`Transport`] seam and decodes
//! the results into typed responses. It is cheap to clone and safe to share
//! across tasks.

use crate::cache::CacheManager;
use crate::config::ClientConfig;
use crate::error::{ApiError, ErrorCode, Result};
use crate::options::TakeOptions;
use crate::signing::RequestSigner;
use crate::transport::{BinaryResponse, Headers, HttpTransport, Params, Transport};
use crate::types::{
    decode, BatchRequest, BatchResponse, DeviceInfo, PresetInfo, ScreenshotResponse, UsageInfo,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const SCREENSHOT_PATH: &str = "/v1/screenshot";
const BATCH_PATH: &str = "/v1/batch";

/// RenderScreenshot API client
///
/// # Examples
///
/// ```rust,no_run
/// use renderscreenshot::{Client, ClientConfig, TakeOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = Client::new("rs_live_xxx", ClientConfig::default())?;
///
///     let image = client
///         .take(&TakeOptions::url("https://example.com").width(1200))
///         .await?;
///     std::fs::write("example.png", image)?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    base_url: String,
    signing_key: Option<String>,
    public_key_id: Option<String>,
    cache: CacheManager,
}

#[derive(Deserialize)]
struct PresetList {
    #[serde(default)]
    presets: Vec<PresetInfo>,
}

#[derive(Deserialize)]
struct DeviceList {
    #[serde(default)]
    devices: Vec<DeviceInfo>,
}

impl Client {
    /// Creates a client backed by the HTTP transport.
    ///
    /// Fails with `unauthorized` when `api_key` is empty, and with
    /// `invalid_request` when `config` does not validate.
    pub fn new(api_key: impl Into<String>, config: ClientConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ApiError::new(
                "Invalid or missing API key",
                401,
                Some(ErrorCode::Unauthorized),
            ));
        }

        let transport = HttpTransport::new(api_key, &config)?;
        Self::with_transport(Arc::new(transport), config)
    }

    /// Creates a client over any [`Transport`] implementation.
    pub fn with_transport(transport: Arc<dyn Transport>, config: ClientConfig) -> Result<Self> {
        let base_url = config.validate()?;

        Ok(Self {
            cache: CacheManager::new(transport.clone()),
            transport,
            base_url,
            signing_key: config.signing_key.filter(|k| !k.is_empty()),
            public_key_id: config.public_key_id.filter(|k| !k.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Captures a screenshot and returns the raw image or PDF bytes.
    pub async fn take(&self, options: &TakeOptions) -> Result<Vec<u8>> {
        Ok(self.take_binary(options).await?.body)
    }

    /// Like [`take`](Self::take), keeping the response headers.
    pub async fn take_binary(&self, options: &TakeOptions) -> Result<BinaryResponse> {
        let body = Value::Object(options.to_params());
        self.transport
            .post_binary(SCREENSHOT_PATH, &body, &Headers::new())
            .await
    }

    /// Captures a screenshot and returns its metadata instead of the bytes.
    pub async fn take_json(&self, options: &TakeOptions) -> Result<ScreenshotResponse> {
        let body = Value::Object(options.to_params());
        let mut headers = Headers::new();
        headers.insert("Accept".to_string(), "application/json".to_string());

        let response = self
            .transport
            .post(SCREENSHOT_PATH, &body, &headers)
            .await?;
        decode(response)
    }

    /// Builds a signed screenshot URL that can be handed to a browser.
    ///
    /// `signing_key` and `public_key_id` override the configured credentials
    /// when given. Fails with `invalid_request` when neither source provides
    /// both.
    pub fn generate_url(
        &self,
        options: &TakeOptions,
        expires_at: DateTime<Utc>,
        signing_key: Option<&str>,
        public_key_id: Option<&str>,
    ) -> Result<String> {
        let signer = RequestSigner::resolve(
            signing_key,
            public_key_id,
            self.signing_key.as_deref(),
            self.public_key_id.as_deref(),
        )?;

        debug!(key_id = signer.key_id(), expires = expires_at.timestamp(), "signing url");
        Ok(signer.signed_url(
            &self.base_url,
            SCREENSHOT_PATH,
            &options.to_flat_map(),
            expires_at.timestamp(),
        ))
    }

    /// Starts a batch job capturing every URL with the same options.
    pub async fn batch(
        &self,
        urls: &[String],
        options: Option<&TakeOptions>,
    ) -> Result<BatchResponse> {
        let mut body = json!({ "urls": urls });
        if let Some(options) = options {
            body["options"] = Value::Object(options.to_params());
        }

        let response = self.transport.post(BATCH_PATH, &body, &Headers::new()).await?;
        decode(response)
    }

    /// Starts a batch job with per-URL options.
    pub async fn batch_advanced(&self, requests: &[BatchRequest]) -> Result<BatchResponse> {
        let entries: Vec<Value> = requests.iter().map(BatchRequest::to_entry).collect();
        let body = json!({ "requests": entries });

        let response = self.transport.post(BATCH_PATH, &body, &Headers::new()).await?;
        decode(response)
    }

    /// Current status of a batch job.
    pub async fn get_batch(&self, batch_id: &str) -> Result<BatchResponse> {
        self.get_json(&format!("{BATCH_PATH}/{batch_id}")).await
    }

    pub async fn presets(&self) -> Result<Vec<PresetInfo>> {
        let list: PresetList = self.get_json("/v1/presets").await?;
        Ok(list.presets)
    }

    pub async fn preset(&self, id: &str) -> Result<PresetInfo> {
        self.get_json(&format!("/v1/presets/{id}")).await
    }

    pub async fn devices(&self) -> Result<Vec<DeviceInfo>> {
        let list: DeviceList = self.get_json("/v1/devices").await?;
        Ok(list.devices)
    }

    /// Credits and usage for the current billing period.
    pub async fn usage(&self) -> Result<UsageInfo> {
        self.get_json("/v1/usage").await
    }

    /// Cache management operations sharing this client's transport.
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .transport
            .get(path, &Params::new(), &Headers::new())
            .await?;
        decode(response)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("public_key_id", &self.public_key_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::hmac_sha256_hex;
    use crate::transport::{JsonMap, MockTransport};
    use chrono::TimeZone;

    fn object(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected a JSON object"),
        }
    }

    fn client_with(transport: MockTransport) -> Client {
        Client::with_transport(Arc::new(transport), ClientConfig::default()).unwrap()
    }

    fn signing_client() -> Client {
        let config = ClientConfig {
            signing_key: Some("rs_secret_cfg".to_string()),
            public_key_id: Some("rs_pub_cfg".to_string()),
            ..Default::default()
        };
        Client::with_transport(Arc::new(MockTransport::new()), config).unwrap()
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        let err = Client::new("", ClientConfig::default()).unwrap_err();
        assert_eq!(err.http_status(), 401);
        assert_eq!(err.code(), Some(&ErrorCode::Unauthorized));
        assert_eq!(err.message(), "Invalid or missing API key");
    }

    #[test]
    fn test_new_validates_config() {
        let config = ClientConfig {
            base_url: "api.renderscreenshot.com".to_string(),
            ..Default::default()
        };
        let err = Client::new("rs_live_key", config).unwrap_err();
        assert_eq!(err.code(), Some(&ErrorCode::InvalidRequest));
    }

    #[tokio::test]
    async fn test_take_posts_grouped_params() {
        let mut transport = MockTransport::new();
        transport
            .expect_post_binary()
            .withf(|path, body, headers| {
                path == "/v1/screenshot"
                    && *body
                        == json!({
                            "url": "https://example.com",
                            "viewport": {"width": 1200}
                        })
                    && headers.is_empty()
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(BinaryResponse {
                    body: b"png-bytes".to_vec(),
                    ..Default::default()
                })
            });

        let client = client_with(transport);
        let image = client
            .take(&TakeOptions::url("https://example.com").width(1200))
            .await
            .unwrap();
        assert_eq!(image, b"png-bytes");
    }

    #[tokio::test]
    async fn test_take_json_sets_accept_header() {
        let mut transport = MockTransport::new();
        transport
            .expect_post()
            .withf(|path, _, headers| {
                path == "/v1/screenshot"
                    && headers.get("Accept").map(String::as_str) == Some("application/json")
            })
            .returning(|_, _, _| {
                Ok(object(json!({
                    "id": "scr_123",
                    "status": "completed",
                    "image": {"url": "https://cdn.example.com/scr_123.png", "width": 1200, "height": 630},
                    "cache": {"hit": true, "key": "cache_abc"}
                })))
            });

        let client = client_with(transport);
        let response = client
            .take_json(&TakeOptions::url("https://example.com"))
            .await
            .unwrap();

        assert_eq!(response.id, "scr_123");
        assert_eq!(response.image.height, 630);
        assert!(response.cache.hit);
        assert_eq!(response.cache.key, "cache_abc");
    }

    #[tokio::test]
    async fn test_take_propagates_api_errors() {
        let mut transport = MockTransport::new();
        transport.expect_post_binary().returning(|_, _, _| {
            Err(ApiError::new("Invalid URL", 400, Some(ErrorCode::InvalidUrl)))
        });

        let client = client_with(transport);
        let err = client
            .take(&TakeOptions::url("not a url"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.code(), Some(&ErrorCode::InvalidUrl));
    }

    #[test]
    fn test_generate_url_with_configured_keys() {
        let client = signing_client();
        let expires = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let url = client
            .generate_url(&TakeOptions::url("https://example.com").width(800), expires, None, None)
            .unwrap();

        let query =
            "expires=1700000000&key_id=rs_pub_cfg&url=https%3A%2F%2Fexample.com&width=800";
        let signature = hmac_sha256_hex(b"rs_secret_cfg", query.as_bytes());
        assert_eq!(
            url,
            format!("https://api.renderscreenshot.com/v1/screenshot?{query}&signature={signature}")
        );
    }

    #[test]
    fn test_generate_url_explicit_keys_override() {
        let client = signing_client();
        let expires = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let url = client
            .generate_url(
                &TakeOptions::url("https://example.com"),
                expires,
                Some("rs_secret_explicit"),
                Some("rs_pub_explicit"),
            )
            .unwrap();

        let query = "expires=1700000000&key_id=rs_pub_explicit&url=https%3A%2F%2Fexample.com";
        let signature = hmac_sha256_hex(b"rs_secret_explicit", query.as_bytes());
        assert!(url.ends_with(&format!("?{query}&signature={signature}")));
    }

    #[test]
    fn test_generate_url_requires_keys() {
        let client = client_with(MockTransport::new());
        let err = client
            .generate_url(&TakeOptions::url("https://example.com"), Utc::now(), None, None)
            .unwrap_err();

        assert_eq!(err.http_status(), 400);
        assert_eq!(err.code(), Some(&ErrorCode::InvalidRequest));
        assert!(err.message().starts_with("Signed URLs require signing_key"));
    }

    #[tokio::test]
    async fn test_batch_body() {
        let mut transport = MockTransport::new();
        transport
            .expect_post()
            .withf(|path, body, _| {
                path == "/v1/batch"
                    && *body
                        == json!({
                            "urls": ["https://a.com", "https://b.com"],
                            "options": {"output": {"format": "png"}}
                        })
            })
            .returning(|_, _, _| {
                Ok(object(json!({"id": "batch_1", "status": "processing", "total": 2})))
            });

        let client = client_with(transport);
        let options = TakeOptions::default().format(crate::ImageFormat::Png);
        let batch = client
            .batch(
                &["https://a.com".to_string(), "https://b.com".to_string()],
                Some(&options),
            )
            .await
            .unwrap();

        assert_eq!(batch.id, "batch_1");
        assert_eq!(batch.total, 2);
        assert!(!batch.is_finished());
    }

    #[tokio::test]
    async fn test_batch_advanced_body() {
        let mut transport = MockTransport::new();
        transport
            .expect_post()
            .withf(|_, body, _| {
                *body
                    == json!({
                        "requests": [
                            {"url": "https://a.com", "viewport": {"width": 800}},
                            {"url": "https://b.com"}
                        ]
                    })
            })
            .returning(|_, _, _| Ok(object(json!({"id": "batch_2"}))));

        let client = client_with(transport);
        let batch = client
            .batch_advanced(&[
                BatchRequest::new("https://a.com").with_options(TakeOptions::default().width(800)),
                BatchRequest::new("https://b.com"),
            ])
            .await
            .unwrap();
        assert_eq!(batch.id, "batch_2");
    }

    #[tokio::test]
    async fn test_listing_endpoints() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .withf(|path, _, _| path == "/v1/presets")
            .returning(|_, _, _| {
                Ok(object(json!({
                    "presets": [{"id": "og_card", "name": "OG Card", "width": 1200, "height": 630}]
                })))
            });
        transport
            .expect_get()
            .withf(|path, _, _| path == "/v1/devices")
            .returning(|_, _, _| Ok(JsonMap::new()));
        transport
            .expect_get()
            .withf(|path, _, _| path == "/v1/presets/og_card")
            .returning(|_, _, _| {
                Ok(object(json!({"id": "og_card", "name": "OG Card", "width": 1200, "height": 630})))
            });
        transport
            .expect_get()
            .withf(|path, _, _| path == "/v1/batch/batch_1")
            .returning(|_, _, _| Ok(object(json!({"id": "batch_1", "status": "completed"}))));

        let client = client_with(transport);

        let presets = client.presets().await.unwrap();
        assert_eq!(presets.len(), 1);
        assert_eq!(presets[0].name, "OG Card");

        assert!(client.devices().await.unwrap().is_empty());
        assert_eq!(client.preset("og_card").await.unwrap().width, 1200);
        assert_eq!(client.get_batch("batch_1").await.unwrap().status, "completed");
    }

    #[tokio::test]
    async fn test_usage_decode_failure() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .withf(|path, _, _| path == "/v1/usage")
            .returning(|_, _, _| Ok(object(json!({"credits": "unlimited"}))));

        let client = client_with(transport);
        let err = client.usage().await.unwrap_err();
        assert!(err.code().is_none());
        assert_eq!(err.http_status(), 0);
    }

    #[tokio::test]
    async fn test_cache_shares_transport() {
        let mut transport = MockTransport::new();
        transport
            .expect_delete()
            .withf(|path, _, _| path == "/v1/cache/cache_abc")
            .times(1)
            .returning(|_, _, _| Ok(JsonMap::new()));

        let client = client_with(transport);
        assert!(client.cache().delete("cache_abc").await.unwrap());
    }
}
