//! Command-line interface argument parsing.
//!
//! Every scan option can be given as a flag or through the environment
//! variable a GitHub Action step would set, so the binary runs unchanged as
//! an action entrypoint or from a developer shell.

use crate::models::ScanType;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// XeOps Guardian - AI ethical hacking in CI
///
/// Submits a security scan of the current repository to XeOps, waits for it
/// to finish, reports the findings and fails the build on critical
/// vulnerabilities when asked to.
///
/// Examples:
///   xeops-guardian --fail-on-critical --comment-pr
///   xeops-guardian --repository owner/repo --sha abc123 --scan-type deep
///   xeops-guardian --repository owner/repo --dry-run
///   xeops-guardian --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// XeOps API key
    #[arg(long, env = "XEOPS_API_KEY", hide_env_values = true, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Scan depth
    #[arg(long, env = "SCAN_TYPE", default_value = "standard", value_name = "TYPE")]
    pub scan_type: ScanType,

    /// Fail the build when critical vulnerabilities are found
    #[arg(
        long,
        env = "FAIL_ON_CRITICAL",
        value_name = "BOOL",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub fail_on_critical: bool,

    /// Request proof-of-concept exploit generation
    #[arg(
        long,
        env = "GENERATE_EXPLOITS",
        value_name = "BOOL",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub generate_exploits: bool,

    /// Post the results as a pull request comment
    #[arg(
        long,
        env = "COMMENT_PR",
        value_name = "BOOL",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub comment_pr: bool,

    /// GitHub token used to post the pull request comment
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    pub github_token: Option<String>,

    /// XeOps API gateway URL
    #[arg(long, env = "XEOPS_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// XeOps dashboard URL used for report links
    #[arg(long, env = "XEOPS_DASHBOARD_URL", value_name = "URL")]
    pub dashboard_url: Option<String>,

    /// Maximum time to wait for the scan to finish, in seconds
    #[arg(long, env = "XEOPS_SCAN_TIMEOUT", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Repository to scan as owner/name (defaults to GITHUB_REPOSITORY)
    #[arg(long, value_name = "OWNER/NAME")]
    pub repository: Option<String>,

    /// Commit SHA to record on the scan (defaults to GITHUB_SHA)
    #[arg(long, value_name = "SHA")]
    pub sha: Option<String>,

    /// Treat the run as a pull request with this number
    #[arg(long, value_name = "NUMBER")]
    pub pr_number: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .xeops.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write the report to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report file format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the scan request that would be submitted and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .xeops.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (the PR comment body)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        for url in [&self.api_url, &self.dashboard_url].into_iter().flatten() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("URL must start with 'http://' or 'https://': {}", url));
            }
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref repository) = self.repository {
            if repository.split('/').filter(|part| !part.is_empty()).count() != 2 {
                return Err(format!(
                    "Repository must be given as owner/name: {}",
                    repository
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
