//! XeOps Guardian - AI ethical hacking in CI
//!
//! Submits a security scan of the current repository to the XeOps scanning
//! service, waits for it to finish, reports the findings as step outputs and
//! an optional pull request comment, and fails the build on critical
//! vulnerabilities when asked to.
//!
//! Exit codes:
//!   0 - Success (no failure condition met)
//!   1 - Runtime error (configuration, submission, polling, comment, outputs)
//!   2 - Critical vulnerabilities found with --fail-on-critical

mod analysis;
mod cli;
mod config;
mod error;
mod github;
mod models;
mod orchestrator;
mod report;
mod service;

use anyhow::{Context, Result};
use cli::Args;
use config::{FileConfig, ScanConfiguration, CONFIG_FILE_NAME};
use error::GuardianError;
use github::{annotate_failure, ActionOutputs, CiContext, GithubCommentPublisher};
use orchestrator::{RunOutcome, ScanOrchestrator};
use service::HttpScanService;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // No logging needed to write the config file.
    if args.init_config {
        if let Err(e) = handle_init_config() {
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    init_logging(&args);

    info!("XeOps Guardian v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let outcome = match run_guardian(&args).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Guardian failed: {:#}", e);
            RunOutcome::Errored {
                message: format!("{:#}", e),
            }
        }
    };

    if let Some(message) = outcome.failure_message() {
        annotate_failure(message);
        eprintln!("\n{}", message);
    }

    std::process::exit(outcome.exit_code());
}

/// Handle --init-config: generate a default .xeops.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        anyhow::bail!(
            "{} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
    }

    let content = FileConfig::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the service endpoints and polling limits.");
    Ok(())
}

/// Initialize the logging subsystem.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Assemble the run configuration and drive one scan through its lifecycle.
async fn run_guardian(args: &Args) -> Result<RunOutcome> {
    let start_time = Instant::now();

    let mut file_config = load_config(args)?;
    file_config.merge_with_args(args);

    let ci = load_ci_context(args).map_err(configuration_error)?;
    let config = ScanConfiguration::assemble(args, file_config, ci);

    if !args.quiet {
        println!("🛡️ XeOps Guardian - AI Ethical Hacking");
        println!("📦 Repository: {}", config.repository());
        println!("🔍 Scan Type: {}", config.scan_type);
        println!("⚙️  Mode: {}", config.mode_label());
    }

    if args.dry_run {
        let request = serde_json::to_string_pretty(&config.scan_request())
            .context("Failed to serialize scan request")?;
        println!("\n📋 Scan request (dry run, nothing submitted):");
        println!("{}", request);
        return Ok(RunOutcome::Passed);
    }

    let service = HttpScanService::new(&config.service).map_err(configuration_error)?;

    let publisher = match config.github_token {
        Some(ref token) => {
            let api_url = std::env::var("GITHUB_API_URL").ok().filter(|v| !v.is_empty());
            Some(
                GithubCommentPublisher::new(token, api_url.as_deref())
                    .map_err(configuration_error)?,
            )
        }
        None => {
            if config.comment_target().is_some() {
                warn!("GITHUB_TOKEN is not set; the pull request comment will be skipped");
            }
            None
        }
    };

    let mut orchestrator = ScanOrchestrator::new(config, service, publisher, ActionOutputs::from_env())
        .with_progress(!args.quiet);
    if let Some(ref path) = args.output {
        orchestrator = orchestrator.with_report_file(path.clone(), args.format);
    }

    let outcome = orchestrator.run().await;
    debug!("Final lifecycle state: {:?}", orchestrator.state());
    info!("Run finished in {:.1}s", start_time.elapsed().as_secs_f64());

    Ok(outcome)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<FileConfig> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return FileConfig::load(config_path).map_err(configuration_error);
    }

    match FileConfig::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(FileConfig::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(FileConfig::default())
        }
    }
}

/// Read the CI context and apply command-line overrides.
fn load_ci_context(args: &Args) -> Result<CiContext> {
    let mut ci = CiContext::from_env()?;

    if let Some(ref repository) = args.repository {
        ci.set_repository(repository)?;
    }
    if let Some(ref sha) = args.sha {
        ci.sha = sha.clone();
    }
    if let Some(number) = args.pr_number {
        ci.set_pull_request(number);
    }

    ci.ensure_complete()?;
    Ok(ci)
}

fn configuration_error(err: anyhow::Error) -> anyhow::Error {
    GuardianError::Configuration(format!("Configuration error: {:#}", err)).into()
}
