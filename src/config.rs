//! Client configuration with serde serialization/deserialization
//!
//! All fields carry documented defaults so a config file only needs to list
//! what it changes. The configuration is validated once when a
//! [`Client`](crate::Client) is built and is immutable afterwards.

use crate::error::{ApiError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.renderscreenshot.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Main configuration structure for the API client
///
/// # Examples
///
/// ```rust
/// use renderscreenshot::ClientConfig;
/// use std::time::Duration;
///
/// // Use default configuration
/// let config = ClientConfig::default();
///
/// // Opt in to retries for transient failures
/// let config = ClientConfig {
///     max_retries: 3,
///     retry_delay: Duration::from_millis(500),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API base URL (default: https://api.renderscreenshot.com)
    ///
    /// A trailing slash is ignored.
    pub base_url: String,

    /// Timeout for each individual HTTP attempt (default: 30 seconds)
    pub timeout: Duration,

    /// Number of extra attempts for transient failures (default: 0)
    ///
    /// Retries are opt-in. Only errors classified as retryable are retried,
    /// so validation and authentication failures always fail fast.
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries (default: 1 second)
    pub retry_delay: Duration,

    /// Secret key used to sign URLs (`rs_secret_*`)
    pub signing_key: Option<String>,

    /// Public key identifier embedded in signed URLs (`rs_pub_*`)
    pub public_key_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
            retry_delay: DEFAULT_RETRY_DELAY,
            signing_key: None,
            public_key_id: None,
        }
    }
}

impl ClientConfig {
    /// Builds a configuration from `RENDERSCREENSHOT_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Replaces fields whose `RENDERSCREENSHOT_*` variable is set and
    /// non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(base_url) = var("RENDERSCREENSHOT_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(signing_key) = var("RENDERSCREENSHOT_SIGNING_KEY") {
            self.signing_key = Some(signing_key);
        }
        if let Some(public_key_id) = var("RENDERSCREENSHOT_PUBLIC_KEY_ID") {
            self.public_key_id = Some(public_key_id);
        }
        self
    }

    /// Checks the configuration and returns the normalized base URL.
    pub fn validate(&self) -> Result<String> {
        if self.timeout.is_zero() {
            return Err(ApiError::invalid_request(
                "invalid configuration: timeout must be greater than 0",
                0,
            ));
        }

        let base_url = self.base_url.trim_end_matches('/');
        let parsed = url::Url::parse(base_url).map_err(|e| {
            ApiError::invalid_request(
                format!("invalid configuration: base_url {base_url:?}: {e}"),
                0,
            )
        })?;

        match parsed.scheme() {
            "http" | "https" => Ok(base_url.to_string()),
            scheme => Err(ApiError::invalid_request(
                format!("invalid configuration: unsupported base_url scheme {scheme:?}"),
                0,
            )),
        }
    }
}
