//! Data models for the scan orchestrator.
//!
//! This module contains the request/response schemas exchanged with the
//! scanning service and the values derived from a scan result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Tag identifying this integration in scan requests.
pub const SCAN_SOURCE: &str = "github-action";

/// Depth of the requested scan.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    /// Fast surface scan
    Quick,
    /// Default scan depth
    #[default]
    Standard,
    /// Exhaustive scan
    Deep,
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanType::Quick => write!(f, "quick"),
            ScanType::Standard => write!(f, "standard"),
            ScanType::Deep => write!(f, "deep"),
        }
    }
}

/// Severity level of a vulnerability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

impl Severity {
    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Low => "🟢",
            Severity::Medium => "🟡",
            Severity::High => "🟠",
            Severity::Critical => "🔴",
        }
    }

    /// Classify a raw severity label.
    ///
    /// Matching is exact: `"critical"` or `" CRITICAL"` are not recognised.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "CRITICAL" => Some(Severity::Critical),
            "HIGH" => Some(Severity::High),
            "MEDIUM" => Some(Severity::Medium),
            "LOW" => Some(Severity::Low),
            _ => None,
        }
    }
}

/// A single finding reported by the scanning service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vulnerability {
    /// Short title of the finding.
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    /// Severity label exactly as returned by the service.
    #[serde(default, deserialize_with = "null_as_default")]
    pub severity: String,
    /// File the finding was located in, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Longer description of the finding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Vulnerability {
    /// The classified severity, or `None` for labels outside the four known levels.
    pub fn level(&self) -> Option<Severity> {
        Severity::from_label(&self.severity)
    }

    pub fn is_critical(&self) -> bool {
        self.level() == Some(Severity::Critical)
    }
}

/// Findings of one completed scan, in the order the service returned them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResult {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub vulnerabilities: Vec<Vulnerability>,
}

impl ScanResult {
    /// Raw number of findings, classified or not.
    pub fn len(&self) -> usize {
        self.vulnerabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vulnerabilities.is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Vulnerability>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Vulnerability>>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Per-severity counts derived from a [`ScanResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityTally {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    /// Sum of the four known buckets.
    pub total: usize,
    /// Findings whose severity label matched none of the known levels.
    pub unclassified: usize,
}

impl SeverityTally {
    pub fn has_criticals(&self) -> bool {
        self.critical > 0
    }
}

/// Repository identity attached to a scan request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanMetadata {
    pub repo: String,
    pub owner: String,
    pub sha: String,
    pub pr_number: Option<u64>,
}

/// Body of the scan creation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRequest {
    pub target_url: String,
    pub scan_type: ScanType,
    pub source: String,
    pub metadata: ScanMetadata,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub generate_exploits: bool,
}

/// Correlation key for every call after submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanHandle {
    pub scan_id: String,
}

impl ScanHandle {
    pub fn new(scan_id: impl Into<String>) -> Self {
        Self {
            scan_id: scan_id.into(),
        }
    }
}

impl fmt::Display for ScanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.scan_id)
    }
}

/// Response of the scan creation call.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateScanResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected scan id string, got {}",
            other
        ))),
    }
}

/// Response of the scan status call.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanStatusResponse {
    #[serde(default)]
    pub status: String,
}

/// Lifecycle state of a remote scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
    /// Any status string the service may add later; treated as in-progress.
    Other(String),
}

impl ScanState {
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "pending" | "queued" => ScanState::Pending,
            "running" | "in_progress" => ScanState::Running,
            "completed" => ScanState::Completed,
            "failed" => ScanState::Failed,
            "timeout" => ScanState::TimedOut,
            _ => ScanState::Other(status.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanState::Completed | ScanState::Failed | ScanState::TimedOut
        )
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanState::Pending => write!(f, "pending"),
            ScanState::Running => write!(f, "running"),
            ScanState::Completed => write!(f, "completed"),
            ScanState::Failed => write!(f, "failed"),
            ScanState::TimedOut => write!(f, "timeout"),
            ScanState::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Pass/fail verdict for the build plus the dashboard link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDecision {
    pub should_fail_build: bool,
    pub report_url: String,
}

/// Metadata about one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// `owner/name` of the scanned repository.
    pub repository: String,
    /// Commit the scan was requested for.
    pub commit_sha: String,
    pub scan_type: ScanType,
    pub scan_id: String,
    /// Time the report was produced.
    pub generated_at: DateTime<Utc>,
}

/// Complete, serializable record of a scan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub metadata: ReportMetadata,
    pub summary: SeverityTally,
    /// Raw finding count, including unclassified severities.
    pub vulnerabilities_found: usize,
    pub decision: ReportDecision,
    pub vulnerabilities: Vec<Vulnerability>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_severity_emoji() {
        assert_eq!(Severity::Critical.emoji(), "🔴");
        assert_eq!(Severity::High.emoji(), "🟠");
        assert_eq!(Severity::Medium.emoji(), "🟡");
        assert_eq!(Severity::Low.emoji(), "🟢");
    }

    #[test]
    fn test_severity_from_label_is_exact() {
        assert_eq!(Severity::from_label("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::from_label("LOW"), Some(Severity::Low));
        assert_eq!(Severity::from_label("critical"), None);
        assert_eq!(Severity::from_label("INFO"), None);
        assert_eq!(Severity::from_label(""), None);
    }

    #[test]
    fn test_scan_result_missing_vulnerabilities_is_empty() {
        let result: ScanResult = serde_json::from_str(r#"{"scan_id": "x"}"#).unwrap();
        assert!(result.is_empty());

        let result: ScanResult = serde_json::from_str(r#"{"vulnerabilities": null}"#).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_vulnerability_optional_fields() {
        let result: ScanResult = serde_json::from_str(
            r#"{"vulnerabilities": [{"severity": "HIGH", "title": "XSS"}]}"#,
        )
        .unwrap();
        assert_eq!(result.len(), 1);
        let vuln = &result.vulnerabilities[0];
        assert_eq!(vuln.level(), Some(Severity::High));
        assert!(vuln.file.is_none());
        assert!(vuln.description.is_none());
    }

    #[test]
    fn test_vulnerability_null_title_and_severity() {
        let result: ScanResult = serde_json::from_str(
            r#"{"vulnerabilities": [
                {"severity": "CRITICAL", "title": null},
                {"severity": null, "title": "Open Redirect"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.vulnerabilities[0].title, "");
        assert!(result.vulnerabilities[0].is_critical());
        assert_eq!(result.vulnerabilities[1].title, "Open Redirect");
        assert_eq!(result.vulnerabilities[1].level(), None);
    }

    #[test]
    fn test_create_scan_response_accepts_numeric_id() {
        let resp: CreateScanResponse =
            serde_json::from_str(r#"{"id": 42, "status": "pending"}"#).unwrap();
        assert_eq!(resp.id, "42");

        let resp: CreateScanResponse = serde_json::from_str(r#"{"id": "scan-123"}"#).unwrap();
        assert_eq!(resp.id, "scan-123");
        assert!(resp.status.is_none());

        assert!(serde_json::from_str::<CreateScanResponse>(r#"{"status": "pending"}"#).is_err());
    }

    #[test]
    fn test_scan_request_serialization() {
        let request = ScanRequest {
            target_url: "https://github.com/test-owner/test-repo".to_string(),
            scan_type: ScanType::Standard,
            source: SCAN_SOURCE.to_string(),
            metadata: ScanMetadata {
                repo: "test-repo".to_string(),
                owner: "test-owner".to_string(),
                sha: "abc123".to_string(),
                pr_number: None,
            },
            generate_exploits: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["scan_type"], "standard");
        assert_eq!(json["source"], "github-action");
        assert!(json["metadata"]["pr_number"].is_null());
        assert!(json.get("generate_exploits").is_none());

        let json = serde_json::to_value(ScanRequest {
            generate_exploits: true,
            ..request
        })
        .unwrap();
        assert_eq!(json["generate_exploits"], true);
    }

    #[test]
    fn test_scan_state_terminal() {
        assert!(ScanState::from_status("completed").is_terminal());
        assert!(ScanState::from_status("FAILED").is_terminal());
        assert!(ScanState::from_status("timeout").is_terminal());
        assert!(!ScanState::from_status("pending").is_terminal());
        assert!(!ScanState::from_status("running").is_terminal());
        assert_eq!(
            ScanState::from_status("warming_up"),
            ScanState::Other("warming_up".to_string())
        );
    }
}
