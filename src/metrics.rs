use crate::error::ApiError;
use metrics::{register_counter, register_histogram, Counter, Histogram};
use std::time::Duration;

/// Transport-level instruments. Recording is a no-op until the host
/// application installs a `metrics` recorder.
pub struct TransportMetrics {
    pub requests: Counter,
    pub retries: Counter,
    pub request_duration: Histogram,
}

impl TransportMetrics {
    pub fn new() -> Self {
        Self {
            requests: register_counter!("renderscreenshot_requests_total"),
            retries: register_counter!("renderscreenshot_retries_total"),
            request_duration: register_histogram!("renderscreenshot_request_duration_seconds"),
        }
    }

    pub fn record_attempt(&self, duration: Duration) {
        self.requests.increment(1);
        self.request_duration.record(duration.as_secs_f64());
    }

    pub fn record_retry(&self) {
        self.retries.increment(1);
    }

    pub fn record_error(&self, error: &ApiError) {
        let code = error
            .code()
            .map(|code| code.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        metrics::increment_counter!("renderscreenshot_errors_total", "code" => code);
    }
}

impl Default for TransportMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransportMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportMetrics").finish_non_exhaustive()
    }
}
