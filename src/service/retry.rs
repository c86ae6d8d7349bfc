//! Retry policy for idempotent scan service reads.
//!
//! Only status queries go through this path: submission is never retried,
//! and result downloads happen once after a terminal status.

use super::ApiError;
use backon::ExponentialBuilder;
use std::time::Duration;

/// Determines if an HTTP status code is retryable.
pub fn is_retryable_http(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Determines if an error from a scan service call is transient.
///
/// Timeouts and connection failures are retryable, as are responses with a
/// retryable status code.
pub fn is_retryable_anyhow(e: &anyhow::Error) -> bool {
    if let Some(api_err) = e.downcast_ref::<ApiError>() {
        return is_retryable_http(api_err.status);
    }

    if let Some(req_err) = e.downcast_ref::<reqwest::Error>() {
        if req_err.is_timeout() || req_err.is_connect() {
            return true;
        }
        if let Some(status) = req_err.status() {
            return is_retryable_http(status.as_u16());
        }
    }

    false
}

/// Backoff for a single status query: factor 2, 1s minimum, 3 retries, jitter.
pub fn status_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_factor(2.0)
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(30))
        .with_max_times(3)
        .with_jitter()
}
