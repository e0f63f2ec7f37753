//! Response shapes returned by the API.
//!
//! Every field defaults when absent so partial responses still decode.

use crate::error::{ApiError, Result};
use crate::options::TakeOptions;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decodes a response object into `T`. A shape mismatch is an error with no
/// code and no HTTP status.
pub(crate) fn decode<T: DeserializeOwned>(map: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(map)).map_err(|e| {
        ApiError::new(
            format!("failed to decode {} response: {e}", short_type_name::<T>()),
            0,
            None,
        )
    })
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScreenshotResponse {
    pub id: String,
    pub status: String,
    pub image: ImageInfo,
    pub cache: CacheInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ImageInfo {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheInfo {
    pub hit: bool,
    pub key: String,
}

/// Status of a batch job.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchResponse {
    pub id: String,
    pub status: String,
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
    pub results: Vec<BatchResult>,
}

impl BatchResponse {
    pub fn is_finished(&self) -> bool {
        self.total > 0 && self.completed + self.failed >= self.total
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchResult {
    pub url: String,
    pub status: String,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One entry of an advanced batch: a URL with its own options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchRequest {
    pub url: String,
    pub options: Option<TakeOptions>,
}

impl BatchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: None,
        }
    }

    pub fn with_options(mut self, options: TakeOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Request entry: the option groups plus `url`. The entry's own URL
    /// always wins over one set in the options.
    pub fn to_entry(&self) -> Value {
        let mut entry = self
            .options
            .as_ref()
            .map(TakeOptions::to_params)
            .unwrap_or_else(Map::new);
        entry.insert("url".to_string(), Value::String(self.url.clone()));
        Value::Object(entry)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PresetInfo {
    pub id: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
}

/// Account credits for the current billing period.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UsageInfo {
    pub credits: i64,
    pub used: i64,
    pub remaining: i64,
    pub period_start: String,
    pub period_end: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PurgeResult {
    pub purged: u64,
    pub keys: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_screenshot_response() {
        let response: ScreenshotResponse = serde_json::from_value(json!({
            "id": "scr_1",
            "image": {"url": "https://cdn.example.com/scr_1.png", "width": 1200}
        }))
        .unwrap();

        assert_eq!(response.id, "scr_1");
        assert_eq!(response.status, "");
        assert_eq!(response.image.width, 1200);
        assert_eq!(response.image.height, 0);
        assert!(!response.cache.hit);
    }

    #[test]
    fn test_decode_mismatch_has_no_code() {
        let mut map = Map::new();
        map.insert("credits".to_string(), json!("lots"));

        let err = decode::<UsageInfo>(map).unwrap_err();
        assert!(err.code().is_none());
        assert_eq!(err.http_status(), 0);
        assert!(err.message().contains("UsageInfo"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_batch_progress() {
        let batch: BatchResponse = serde_json::from_value(json!({
            "id": "batch_1",
            "status": "processing",
            "total": 3,
            "completed": 2,
            "failed": 1,
            "results": [
                {"url": "https://a.com", "status": "completed", "image_url": "https://cdn/a.png"},
                {"url": "https://b.com", "status": "failed", "error": "timeout"}
            ]
        }))
        .unwrap();

        assert!(batch.is_finished());
        assert_eq!(batch.results.len(), 2);
        assert_eq!(batch.results[1].error.as_deref(), Some("timeout"));
        assert!(!BatchResponse::default().is_finished());
    }

    #[test]
    fn test_batch_entry_url_wins() {
        let entry = BatchRequest::new("https://a.com")
            .with_options(TakeOptions::url("https://ignored.com").width(800))
            .to_entry();

        assert_eq!(
            entry,
            json!({"url": "https://a.com", "viewport": {"width": 800}})
        );
        assert_eq!(
            BatchRequest::new("https://b.com").to_entry(),
            json!({"url": "https://b.com"})
        );
    }
}
