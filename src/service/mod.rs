//! Scanning service boundary.
//!
//! The orchestrator talks to the remote scanner only through [`ScanService`],
//! so the lifecycle can be driven against the HTTP client in production and
//! against in-memory fakes in tests.

pub mod client;
pub mod retry;

use crate::models::{ScanHandle, ScanRequest, ScanResult, ScanState};
use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

pub use client::HttpScanService;
pub use retry::{is_retryable_anyhow, status_backoff};

/// Contract of the remote scanning service.
#[async_trait]
pub trait ScanService: Send + Sync {
    /// Create a scan and return its identifier.
    async fn create_scan(&self, api_key: &SecretString, request: &ScanRequest)
        -> Result<ScanHandle>;

    /// Current lifecycle state of a scan. Safe to call repeatedly.
    async fn scan_status(&self, api_key: &SecretString, handle: &ScanHandle) -> Result<ScanState>;

    /// Findings of a completed scan.
    async fn scan_results(&self, api_key: &SecretString, handle: &ScanHandle)
        -> Result<ScanResult>;
}

/// Non-success HTTP response from the scanning service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    /// Build an error from a status code and raw response body.
    ///
    /// A JSON body with a `message`, `error` or `detail` string is reduced to
    /// that string so the service's own wording reaches the CI log.
    pub fn from_response(status: u16, reason: &str, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|json| {
                ["message", "error", "detail"]
                    .iter()
                    .find_map(|key| json.get(*key).and_then(|v| v.as_str()).map(String::from))
            })
            .unwrap_or_else(|| {
                let body = body.trim();
                if body.is_empty() {
                    format!("Request failed with status code {} {}", status, reason)
                } else {
                    format!("Request failed with status code {}: {}", status, body)
                }
            });

        Self { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_uses_json_message() {
        let err = ApiError::from_response(
            429,
            "Too Many Requests",
            r#"{"message": "API rate limit exceeded"}"#,
        );
        assert_eq!(err.status, 429);
        assert_eq!(err.to_string(), "API rate limit exceeded");

        let err = ApiError::from_response(400, "Bad Request", r#"{"detail": "bad scan_type"}"#);
        assert_eq!(err.to_string(), "bad scan_type");
    }

    #[test]
    fn test_api_error_falls_back_to_body() {
        let err = ApiError::from_response(502, "Bad Gateway", "upstream unavailable");
        assert_eq!(
            err.to_string(),
            "Request failed with status code 502: upstream unavailable"
        );

        let err = ApiError::from_response(401, "Unauthorized", "");
        assert_eq!(
            err.to_string(),
            "Request failed with status code 401 Unauthorized"
        );
    }
}
