//! Webhook signature verification and payload parsing.
//!
//! Deliveries carry three headers: `X-Webhook-Signature` (`sha256=<hex>`),
//! `X-Webhook-Timestamp` (Unix seconds) and `X-Webhook-Id`. The signature is
//! an HMAC-SHA256 over `"{timestamp}.{payload}"` keyed with the webhook
//! secret.

use crate::error::{ApiError, Result};
use crate::signing::hmac_sha256_hex;
use chrono::Utc;
use serde_json::{Map, Value};
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::debug;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";
pub const ID_HEADER: &str = "x-webhook-id";

/// Maximum accepted distance between the delivery timestamp and local time.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

/// Checks a delivery's signature and freshness.
///
/// Returns `false` for any failure: an empty argument, a non-integer
/// timestamp, a timestamp further than `tolerance` from now in either
/// direction, or a signature mismatch. A `tolerance` of `None` or zero means
/// [`DEFAULT_TOLERANCE`].
pub fn verify_webhook(
    payload: &str,
    signature: &str,
    timestamp: &str,
    secret: &str,
    tolerance: Option<Duration>,
) -> bool {
    verify_webhook_at(
        payload,
        signature,
        timestamp,
        secret,
        tolerance,
        Utc::now().timestamp(),
    )
}

/// [`verify_webhook`] against an explicit clock reading.
pub fn verify_webhook_at(
    payload: &str,
    signature: &str,
    timestamp: &str,
    secret: &str,
    tolerance: Option<Duration>,
    now: i64,
) -> bool {
    if payload.is_empty() || signature.is_empty() || timestamp.is_empty() || secret.is_empty() {
        return false;
    }

    let Ok(sent_at) = timestamp.parse::<i64>() else {
        debug!("rejecting webhook with malformed timestamp");
        return false;
    };

    let tolerance = tolerance
        .filter(|t| !t.is_zero())
        .unwrap_or(DEFAULT_TOLERANCE)
        .as_secs();
    if now.abs_diff(sent_at) > tolerance {
        debug!(sent_at, now, tolerance, "rejecting webhook outside replay window");
        return false;
    }

    let expected = expected_signature(payload, timestamp, secret);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

/// `sha256=<hex>` value a sender would attach for this payload and timestamp.
pub fn expected_signature(payload: &str, timestamp: &str, secret: &str) -> String {
    let message = format!("{timestamp}.{payload}");
    format!(
        "sha256={}",
        hmac_sha256_hex(secret.as_bytes(), message.as_bytes())
    )
}

/// A parsed webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    /// Event type, e.g. `screenshot.completed`.
    pub event_type: String,
    pub id: String,
    /// Unix seconds.
    pub timestamp: i64,
    pub data: Map<String, Value>,
}

impl WebhookEvent {
    pub fn is_completed(&self) -> bool {
        self.event_type == "screenshot.completed" || self.event_type == "batch.completed"
    }

    pub fn is_failed(&self) -> bool {
        self.event_type == "screenshot.failed"
    }
}

/// Parses a verified payload. Call [`verify_webhook`] first.
///
/// The event type comes from `"type"`, falling back to `"event"`. Missing
/// fields default to empty values; a non-object `"data"` becomes an empty
/// map.
pub fn parse_webhook(payload: &str) -> Result<WebhookEvent> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| ApiError::invalid_request(format!("Invalid webhook payload: {e}"), 400))?;

    let Value::Object(mut object) = value else {
        return Err(ApiError::invalid_request(
            "Invalid webhook payload: expected a JSON object",
            400,
        ));
    };

    let text = |object: &Map<String, Value>, key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let mut event_type = text(&object, "type");
    if event_type.is_empty() {
        event_type = text(&object, "event");
    }

    let timestamp = object
        .get("timestamp")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or_default();

    let data = match object.remove("data") {
        Some(Value::Object(data)) => data,
        _ => Map::new(),
    };

    Ok(WebhookEvent {
        event_type,
        id: text(&object, "id"),
        timestamp,
        data,
    })
}

/// The three webhook headers, empty when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookHeaders {
    pub signature: String,
    pub timestamp: String,
    pub id: String,
}

impl WebhookHeaders {
    /// Pulls the webhook headers out of a `reqwest`/`http` header map.
    pub fn from_header_map(headers: &reqwest::header::HeaderMap) -> Self {
        extract_webhook_headers(
            headers
                .iter()
                .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?))),
        )
    }
}

/// Finds the webhook headers in any name/value sequence.
///
/// Names match case-insensitively, and `_` is treated as `-` so CGI-style
/// names such as `X_WEBHOOK_SIGNATURE` are recognized. The last occurrence
/// wins.
pub fn extract_webhook_headers<'a, I>(headers: I) -> WebhookHeaders
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut found = WebhookHeaders::default();

    for (name, value) in headers {
        let normalized = name.to_ascii_lowercase().replace('_', "-");
        let slot = match normalized.as_str() {
            SIGNATURE_HEADER => &mut found.signature,
            TIMESTAMP_HEADER => &mut found.timestamp,
            ID_HEADER => &mut found.id,
            _ => continue,
        };
        *slot = value.to_string();
    }

    found
}
