//! Configuration handling.
//!
//! Settings come from three layers: an optional `.xeops.toml` file, then
//! environment variables and command-line flags (both parsed by clap), then
//! the CI context. [`ScanConfiguration::assemble`] merges them once at startup
//! into an immutable value that every step reads from.

use crate::cli::Args;
use crate::github::CiContext;
use crate::models::{ScanMetadata, ScanRequest, ScanType, SCAN_SOURCE};
use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".xeops.toml";

/// Root of the `.xeops.toml` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    /// Scanning service endpoints.
    #[serde(default)]
    pub service: ServiceSettings,

    /// Completion polling settings.
    #[serde(default)]
    pub polling: PollingSettings,
}

/// Scanning service endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Base URL of the scan API gateway.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL of the web dashboard used for report links.
    #[serde(default = "default_dashboard_url")]
    pub dashboard_url: String,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            dashboard_url: default_dashboard_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_api_url() -> String {
    "https://xeops-api-gateway-97758009309.europe-west1.run.app".to_string()
}

fn default_dashboard_url() -> String {
    "https://www.xeops.ai".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

/// Status polling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingSettings {
    /// Delay before the second status query.
    #[serde(default = "default_initial_interval")]
    pub initial_interval_seconds: u64,

    /// Upper bound for the doubling poll interval.
    #[serde(default = "default_max_interval")]
    pub max_interval_seconds: u64,

    /// Give up waiting after this many seconds.
    #[serde(default = "default_deadline")]
    pub deadline_seconds: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            initial_interval_seconds: default_initial_interval(),
            max_interval_seconds: default_max_interval(),
            deadline_seconds: default_deadline(),
        }
    }
}

fn default_initial_interval() -> u64 {
    5
}

fn default_max_interval() -> u64 {
    30
}

fn default_deadline() -> u64 {
    900 // 15 min; deep scans on large repositories are slow
}

impl PollingSettings {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_secs(self.initial_interval_seconds.max(1))
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_secs(self.max_interval_seconds.max(self.initial_interval_seconds).max(1))
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_seconds.max(1))
    }
}

impl FileConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Apply command-line and environment overrides.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref api_url) = args.api_url {
            self.service.api_url = api_url.clone();
        }
        if let Some(ref dashboard_url) = args.dashboard_url {
            self.service.dashboard_url = dashboard_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.polling.deadline_seconds = timeout;
        }
    }

    /// Generate the default configuration file content.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&FileConfig::default()).unwrap_or_default()
    }
}

/// Validated settings for one orchestration run.
#[derive(Debug)]
pub struct ScanConfiguration {
    /// Scan service credential. Checked when the scan is submitted.
    pub api_key: Option<SecretString>,
    pub scan_type: ScanType,
    pub fail_on_critical: bool,
    pub generate_exploits: bool,
    pub comment_on_pr: bool,
    pub repository_owner: String,
    pub repository_name: String,
    pub commit_sha: String,
    pub is_pull_request: bool,
    pub pull_request_number: Option<u64>,
    pub github_token: Option<SecretString>,
    pub service: ServiceSettings,
    pub polling: PollingSettings,
}

impl ScanConfiguration {
    /// Merge file settings, CLI/env arguments and CI context.
    pub fn assemble(args: &Args, file: FileConfig, ci: CiContext) -> Self {
        let FileConfig { service, polling } = file;
        let is_pull_request = ci.is_pull_request();

        Self {
            api_key: non_empty_secret(args.api_key.as_deref()),
            scan_type: args.scan_type,
            fail_on_critical: args.fail_on_critical,
            generate_exploits: args.generate_exploits,
            comment_on_pr: args.comment_pr,
            repository_owner: ci.owner,
            repository_name: ci.repo,
            commit_sha: ci.sha,
            is_pull_request,
            pull_request_number: ci.pull_request_number,
            github_token: non_empty_secret(args.github_token.as_deref()),
            service,
            polling,
        }
    }

    /// `owner/name` of the repository under scan.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.repository_owner, self.repository_name)
    }

    /// Public URL handed to the scanner as the scan target.
    pub fn target_url(&self) -> String {
        format!(
            "https://github.com/{}/{}",
            self.repository_owner, self.repository_name
        )
    }

    /// Build the scan creation body.
    pub fn scan_request(&self) -> ScanRequest {
        ScanRequest {
            target_url: self.target_url(),
            scan_type: self.scan_type,
            source: SCAN_SOURCE.to_string(),
            metadata: ScanMetadata {
                repo: self.repository_name.clone(),
                owner: self.repository_owner.clone(),
                sha: self.commit_sha.clone(),
                pr_number: if self.is_pull_request {
                    self.pull_request_number
                } else {
                    None
                },
            },
            generate_exploits: self.generate_exploits,
        }
    }

    /// Pull request number to comment on, when commenting is enabled and possible.
    pub fn comment_target(&self) -> Option<u64> {
        if !self.comment_on_pr || !self.is_pull_request {
            return None;
        }
        self.pull_request_number
    }

    /// Human-readable label for the selected mode.
    pub fn mode_label(&self) -> &'static str {
        if self.generate_exploits {
            "⚔️ Offense (Exploit Generation)"
        } else {
            "🛡️ Defense (Scanning)"
        }
    }
}

fn non_empty_secret(value: Option<&str>) -> Option<SecretString> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| SecretString::new(v.into()))
}
