//! The single error type surfaced by every operation in the crate.
//!
//! An [`ApiError`] carries the HTTP status (0 when the server was never
//! reached), a machine-readable [`ErrorCode`], the server request id used for
//! support correlation, and the `Retry-After` hint. [`ApiError::from_response`]
//! is the classifier the transport consults for every 4xx/5xx response.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Machine-readable error codes returned by the API or assigned locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidUrl,
    InvalidRequest,
    MissingRequired,
    Unauthorized,
    InvalidApiKey,
    ExpiredSignature,
    Forbidden,
    InsufficientCredits,
    NotFound,
    RateLimited,
    Timeout,
    RenderFailed,
    InternalError,
    ConnectionError,
    /// A code sent by the server that this version does not know about.
    Other(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::InvalidUrl => "invalid_url",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::MissingRequired => "missing_required",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::InvalidApiKey => "invalid_api_key",
            ErrorCode::ExpiredSignature => "expired_signature",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::InsufficientCredits => "insufficient_credits",
            ErrorCode::NotFound => "not_found",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::Timeout => "timeout",
            ErrorCode::RenderFailed => "render_failed",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::ConnectionError => "connection_error",
            ErrorCode::Other(code) => code,
        }
    }

    /// Maps a code string from a response body. Unknown codes are kept verbatim.
    pub fn from_wire(code: &str) -> Self {
        match code {
            "invalid_url" => ErrorCode::InvalidUrl,
            "invalid_request" => ErrorCode::InvalidRequest,
            "missing_required" => ErrorCode::MissingRequired,
            "unauthorized" => ErrorCode::Unauthorized,
            "invalid_api_key" => ErrorCode::InvalidApiKey,
            "expired_signature" => ErrorCode::ExpiredSignature,
            "forbidden" => ErrorCode::Forbidden,
            "insufficient_credits" => ErrorCode::InsufficientCredits,
            "not_found" => ErrorCode::NotFound,
            "rate_limited" => ErrorCode::RateLimited,
            "timeout" => ErrorCode::Timeout,
            "render_failed" => ErrorCode::RenderFailed,
            "internal_error" => ErrorCode::InternalError,
            "connection_error" => ErrorCode::ConnectionError,
            other => ErrorCode::Other(other.to_string()),
        }
    }

    /// Infers a code from the HTTP status alone. Statuses without a mapping
    /// yield `None`.
    pub fn for_status(status: u16) -> Option<Self> {
        match status {
            400 => Some(ErrorCode::InvalidRequest),
            401 => Some(ErrorCode::Unauthorized),
            403 => Some(ErrorCode::Forbidden),
            404 => Some(ErrorCode::NotFound),
            408 => Some(ErrorCode::Timeout),
            // 422 also covers render failures, but only the body can say so.
            422 => Some(ErrorCode::InvalidRequest),
            429 => Some(ErrorCode::RateLimited),
            s if s >= 500 => Some(ErrorCode::InternalError),
            _ => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::RateLimited
                | ErrorCode::Timeout
                | ErrorCode::RenderFailed
                | ErrorCode::InternalError
                | ErrorCode::ConnectionError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed API error. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.render())]
pub struct ApiError {
    message: String,
    http_status: u16,
    code: Option<ErrorCode>,
    request_id: Option<String>,
    retry_after: u64,
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn new(message: impl Into<String>, http_status: u16, code: Option<ErrorCode>) -> Self {
        Self {
            message: message.into(),
            http_status,
            code,
            request_id: None,
            retry_after: 0,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        self.request_id = (!request_id.is_empty()).then_some(request_id);
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = seconds;
        self
    }

    /// The request hit its deadline before a response arrived.
    pub fn timeout() -> Self {
        Self::new("Request timed out", 408, Some(ErrorCode::Timeout))
    }

    /// The server could not be reached at all (DNS, refused, TLS, broken body).
    pub fn connection(detail: impl fmt::Display) -> Self {
        Self::new(
            format!("Failed to connect to server: {detail}"),
            0,
            Some(ErrorCode::ConnectionError),
        )
    }

    pub fn invalid_request(message: impl Into<String>, http_status: u16) -> Self {
        Self::new(message, http_status, Some(ErrorCode::InvalidRequest))
    }

    /// Classifies a 4xx/5xx response.
    ///
    /// `body` is the parsed response body; anything that is not an object
    /// (including `Value::Null` for unparseable bodies) classifies from the
    /// status code alone. The request id header wins over ids found in the
    /// body, and a missing or non-numeric `Retry-After` becomes 0.
    pub fn from_response(
        http_status: u16,
        body: &Value,
        retry_after: Option<&str>,
        request_id: Option<&str>,
    ) -> Self {
        let mut message = format!("HTTP {http_status} error");
        let mut code = None;
        let mut request_id = request_id
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        if let Some(error) = body.get("error").and_then(Value::as_object) {
            if let Some(msg) = error.get("message").and_then(Value::as_str) {
                message = msg.to_string();
            }
            if let Some(c) = error.get("code").and_then(Value::as_str) {
                if !c.is_empty() {
                    code = Some(ErrorCode::from_wire(c));
                }
            }
            if request_id.is_none() {
                request_id = error
                    .get("request_id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string);
            }
        }

        if request_id.is_none() {
            request_id = body
                .get("request_id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(str::to_string);
        }

        Self {
            message,
            http_status,
            code: code.or_else(|| ErrorCode::for_status(http_status)),
            request_id,
            retry_after: retry_after.map(parse_retry_after).unwrap_or(0),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn http_status(&self) -> u16 {
        self.http_status
    }

    pub fn code(&self) -> Option<&ErrorCode> {
        self.code.as_ref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Server-requested backoff in seconds, 0 when absent.
    pub fn retry_after(&self) -> u64 {
        self.retry_after
    }

    pub fn is_retryable(&self) -> bool {
        self.code.as_ref().is_some_and(ErrorCode::is_transient)
            || (500..600).contains(&self.http_status)
    }

    pub fn is_not_found(&self) -> bool {
        self.http_status == 404 || self.code == Some(ErrorCode::NotFound)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.http_status == 429 || self.code == Some(ErrorCode::RateLimited)
    }

    pub fn is_authentication(&self) -> bool {
        self.http_status == 401
    }

    pub fn is_validation(&self) -> bool {
        self.http_status == 400
            || (self.http_status == 422 && self.code != Some(ErrorCode::RenderFailed))
    }

    fn render(&self) -> String {
        let code = self.code.as_ref().map(ErrorCode::as_str).unwrap_or("");
        match (&self.request_id, self.http_status) {
            (Some(request_id), status) => format!(
                "renderscreenshot: {} (status={status}, code={code}, request_id={request_id})",
                self.message
            ),
            (None, 0) => format!("renderscreenshot: {} (code={code})", self.message),
            (None, status) => format!(
                "renderscreenshot: {} (status={status}, code={code})",
                self.message
            ),
        }
    }
}

/// Parses a `Retry-After` header as whole seconds. Anything else is 0.
pub fn parse_retry_after(value: &str) -> u64 {
    value.parse().unwrap_or(0)
}
