//! HTTP client for the XeOps scan API.

use super::{ApiError, ScanService};
use crate::config::ServiceSettings;
use crate::models::{
    CreateScanResponse, ScanHandle, ScanRequest, ScanResult, ScanState, ScanStatusResponse,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::debug;

/// [`ScanService`] backed by the XeOps REST gateway.
pub struct HttpScanService {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpScanService {
    /// Create a client for the configured gateway.
    pub fn new(settings: &ServiceSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .user_agent(concat!("xeops-guardian/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn scans_url(&self) -> String {
        format!("{}/api/scans", self.base_url)
    }

    fn scan_url(&self, handle: &ScanHandle) -> String {
        format!("{}/api/scans/{}", self.base_url, handle.scan_id)
    }

    fn results_url(&self, handle: &ScanHandle) -> String {
        format!("{}/api/scans/{}/results", self.base_url, handle.scan_id)
    }

    /// Turn a non-success response into an [`ApiError`].
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_response(
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            &body,
        )
        .into())
    }
}

#[async_trait]
impl ScanService for HttpScanService {
    async fn create_scan(
        &self,
        api_key: &SecretString,
        request: &ScanRequest,
    ) -> Result<ScanHandle> {
        let url = self.scans_url();
        debug!("POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let created: CreateScanResponse = Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse scan creation response")?;

        debug!(
            "Scan created: id={} status={}",
            created.id,
            created.status.as_deref().unwrap_or("unknown")
        );
        Ok(ScanHandle::new(created.id))
    }

    async fn scan_status(&self, api_key: &SecretString, handle: &ScanHandle) -> Result<ScanState> {
        let url = self.scan_url(handle);
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(api_key.expose_secret())
            .send()
            .await?;

        let status: ScanStatusResponse = Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse scan status response")?;

        Ok(ScanState::from_status(&status.status))
    }

    async fn scan_results(
        &self,
        api_key: &SecretString,
        handle: &ScanHandle,
    ) -> Result<ScanResult> {
        let url = self.results_url(handle);
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(api_key.expose_secret())
            .send()
            .await?;

        let result: ScanResult = Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse scan results response")?;

        debug!("Received {} vulnerabilities", result.len());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(api_url: &str) -> HttpScanService {
        let settings = ServiceSettings {
            api_url: api_url.to_string(),
            ..ServiceSettings::default()
        };
        HttpScanService::new(&settings).unwrap()
    }

    #[test]
    fn test_endpoint_urls() {
        let service = service("https://api.example.com/");
        let handle = ScanHandle::new("scan-123");

        assert_eq!(service.scans_url(), "https://api.example.com/api/scans");
        assert_eq!(
            service.scan_url(&handle),
            "https://api.example.com/api/scans/scan-123"
        );
        assert_eq!(
            service.results_url(&handle),
            "https://api.example.com/api/scans/scan-123/results"
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // Nothing listens on the local discard port.
        let service = service("http://127.0.0.1:9");
        let key = SecretString::new("key".into());

        let err = service
            .scan_status(&key, &ScanHandle::new("scan-1"))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<reqwest::Error>().is_some());
        assert!(crate::service::is_retryable_anyhow(&err));
    }
}
