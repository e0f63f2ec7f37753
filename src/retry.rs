//! Backoff schedule for retrying transient API failures.

use crate::error::ApiError;
use rand::Rng;
use std::time::Duration;

/// Upper bound for computed backoff delays.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts allowed after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: crate::config::DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A zero `base_delay` falls back to the one second default.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        let base_delay = if base_delay.is_zero() {
            crate::config::DEFAULT_RETRY_DELAY
        } else {
            base_delay
        };

        Self {
            max_retries,
            base_delay,
        }
    }

    /// Whether `error`, observed on zero-based `attempt`, earns another try.
    pub fn should_retry(&self, error: &ApiError, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.max_retries
    }

    /// Delay before the attempt following `attempt`.
    ///
    /// A server `Retry-After` is honoured exactly, with no jitter and no cap.
    /// Otherwise the delay is `base * 2^attempt` plus up to half a base delay
    /// of jitter, capped at [`MAX_RETRY_DELAY`].
    pub fn delay_for(&self, error: &ApiError, attempt: u32) -> Duration {
        if error.retry_after() > 0 {
            return Duration::from_secs(error.retry_after());
        }

        let base = self.base_delay.as_secs_f64();
        let exponential = base * 2f64.powi(attempt.min(32) as i32);
        let jitter = if base > 0.0 {
            rand::thread_rng().gen_range(0.0..base * 0.5)
        } else {
            0.0
        };

        Duration::from_secs_f64((exponential + jitter).min(MAX_RETRY_DELAY.as_secs_f64()))
    }
}
