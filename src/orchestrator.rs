//! Scan lifecycle orchestration.
//!
//! Drives one run from submission to the final pass/fail outcome:
//!
//! ```text
//! Idle -> Submitted -> AwaitingCompletion -> ResultsFetched -> Aggregated
//!      -> Decided -> (CommentPublished) -> Finalized
//! ```
//!
//! Any step error moves straight to `Failed`, skips the remaining steps and
//! finalizes with the error's message.

use crate::analysis::{aggregate, decide, generate_summary_text, report_url};
use crate::cli::OutputFormat;
use crate::config::{PollingSettings, ScanConfiguration};
use crate::error::GuardianError;
use crate::github::outputs::{
    OUTPUT_CRITICAL_COUNT, OUTPUT_REPORT_URL, OUTPUT_SCAN_ID, OUTPUT_VULNERABILITIES_FOUND,
};
use crate::github::{CommentPublisher, OutputSink};
use crate::models::{ReportDecision, ScanHandle, ScanResult, ScanState, SeverityTally};
use crate::report::{build_scan_report, generate_json_report, render_comment, save_report};
use crate::service::{is_retryable_anyhow, status_backoff, ScanService};
use backon::{ExponentialBuilder, Retryable};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Position of a run in the scan lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Submitted,
    AwaitingCompletion,
    ResultsFetched,
    Aggregated,
    Decided,
    CommentPublished,
    Finalized,
    Failed,
}

/// How completion is awaited.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Sleep after the first non-terminal status.
    pub initial_interval: Duration,
    /// Ceiling for the doubling sleep.
    pub max_interval: Duration,
    /// Overall wall-clock limit for the wait.
    pub deadline: Duration,
    /// Backoff for retrying a single failed status query.
    pub retry: ExponentialBuilder,
}

impl PollPolicy {
    pub fn from_settings(settings: &PollingSettings) -> Self {
        Self {
            initial_interval: settings.initial_interval(),
            max_interval: settings.max_interval(),
            deadline: settings.deadline(),
            retry: status_backoff(),
        }
    }
}

/// Final status of a run, mapped to the process exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No failure condition was met.
    Passed,
    /// Critical findings with `fail_on_critical` set.
    CriticalThreshold { message: String },
    /// A lifecycle step failed; `message` is the error text.
    Errored { message: String },
}

impl RunOutcome {
    /// Exit code: 0 success, 1 step error, 2 critical threshold.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Passed => 0,
            RunOutcome::Errored { .. } => 1,
            RunOutcome::CriticalThreshold { .. } => 2,
        }
    }

    /// Failure message, if the run failed.
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            RunOutcome::Passed => None,
            RunOutcome::CriticalThreshold { message } | RunOutcome::Errored { message } => {
                Some(message)
            }
        }
    }
}

/// Failure message for the critical threshold.
pub fn critical_failure_message(critical: usize) -> String {
    format!("❌ {} critical vulnerabilities found! Fix required.", critical)
}

/// Values known so far, emitted as outputs however the run ends.
#[derive(Debug, Default)]
struct RunProgress {
    handle: Option<ScanHandle>,
    vulnerabilities_found: Option<usize>,
    tally: Option<SeverityTally>,
    report_failure: Option<String>,
}

/// Sequences every lifecycle step for one scan.
pub struct ScanOrchestrator<S, P, O> {
    config: ScanConfiguration,
    service: S,
    publisher: Option<P>,
    outputs: O,
    policy: PollPolicy,
    report_file: Option<(PathBuf, OutputFormat)>,
    show_progress: bool,
    state: LifecycleState,
}

impl<S, P, O> ScanOrchestrator<S, P, O>
where
    S: ScanService,
    P: CommentPublisher,
    O: OutputSink,
{
    /// Create an orchestrator. `publisher` is `None` when no GitHub token is available.
    pub fn new(config: ScanConfiguration, service: S, publisher: Option<P>, outputs: O) -> Self {
        let policy = PollPolicy::from_settings(&config.polling);
        Self::with_poll_policy(config, service, publisher, outputs, policy)
    }

    /// Create an orchestrator with an explicit polling policy.
    pub fn with_poll_policy(
        config: ScanConfiguration,
        service: S,
        publisher: Option<P>,
        outputs: O,
        policy: PollPolicy,
    ) -> Self {
        Self {
            config,
            service,
            publisher,
            outputs,
            policy,
            report_file: None,
            show_progress: false,
            state: LifecycleState::Idle,
        }
    }

    /// Also write the report to `path` once the decision is made.
    pub fn with_report_file(mut self, path: PathBuf, format: OutputFormat) -> Self {
        self.report_file = Some((path, format));
        self
    }

    /// Show a spinner while waiting for the scan.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    fn transition(&mut self, next: LifecycleState) {
        debug!("Lifecycle: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run the complete lifecycle and produce the final outcome.
    pub async fn run(&mut self) -> RunOutcome {
        let mut progress = RunProgress::default();

        let outcome = match self.execute(&mut progress).await {
            Ok(decision) if decision.should_fail_build => {
                let critical = progress.tally.map(|t| t.critical).unwrap_or_default();
                RunOutcome::CriticalThreshold {
                    message: critical_failure_message(critical),
                }
            }
            Ok(_) => match progress.report_failure.take() {
                Some(message) => RunOutcome::Errored { message },
                None => RunOutcome::Passed,
            },
            Err(err) => {
                error!("Scan failed: {}", err);
                self.transition(LifecycleState::Failed);
                RunOutcome::Errored {
                    message: err.to_string(),
                }
            }
        };

        self.finalize(&progress, outcome)
    }

    async fn execute(&mut self, progress: &mut RunProgress) -> Result<ReportDecision, GuardianError> {
        let handle = self.submit().await?;
        progress.handle = Some(handle.clone());
        self.transition(LifecycleState::Submitted);

        self.transition(LifecycleState::AwaitingCompletion);
        self.await_completion(&handle).await?;

        let result = self.fetch_results(&handle).await?;
        progress.vulnerabilities_found = Some(result.len());
        if result.is_empty() {
            info!("Scan {} reported no vulnerabilities", handle);
        }
        self.transition(LifecycleState::ResultsFetched);

        let tally = aggregate(&result);
        progress.tally = Some(tally);
        self.transition(LifecycleState::Aggregated);

        println!("\n📊 Scan Results:");
        println!("{}", generate_summary_text(&tally, result.len()));
        if tally.unclassified > 0 {
            warn!(
                "{} vulnerabilities have an unrecognised severity and are not counted in any bucket",
                tally.unclassified
            );
        }

        let decision = decide(
            &tally,
            self.config.fail_on_critical,
            &handle,
            &self.config.service.dashboard_url,
        );
        self.transition(LifecycleState::Decided);

        if self.publish_comment(&handle, &result, &tally).await? {
            self.transition(LifecycleState::CommentPublished);
        }

        // Report file errors never override the build decision.
        if let Err(e) = self.write_report_file(&handle, &result, &tally, &decision) {
            error!("{}", e);
            progress.report_failure = Some(e.to_string());
        }

        Ok(decision)
    }

    fn api_key(&self) -> Result<&SecretString, GuardianError> {
        self.config
            .api_key
            .as_ref()
            .ok_or_else(GuardianError::missing_api_key)
    }

    /// Submit the scan request. Fails before any network call without an API key.
    pub async fn submit(&self) -> Result<ScanHandle, GuardianError> {
        let api_key = self.api_key()?;
        let request = self.config.scan_request();

        println!("📡 Initiating security scan...");
        info!(
            "Submitting {} scan for {}",
            request.scan_type, request.target_url
        );

        let handle = self
            .service
            .create_scan(api_key, &request)
            .await
            .map_err(|e| GuardianError::ScanSubmission(format!("{:#}", e)))?;

        println!("✅ Scan initiated with ID: {}", handle);
        Ok(handle)
    }

    /// Poll the scan status until it is terminal or the deadline passes.
    pub async fn await_completion(&self, handle: &ScanHandle) -> Result<(), GuardianError> {
        println!("⏳ Waiting for scan results...");

        let spinner = self.spinner();
        let waited =
            tokio::time::timeout(self.policy.deadline, self.poll_until_terminal(handle, &spinner))
                .await;
        spinner.finish_and_clear();

        match waited {
            Err(_) => Err(GuardianError::ScanTimeout {
                scan_id: handle.scan_id.clone(),
                waited_secs: self.policy.deadline.as_secs(),
            }),
            Ok(Err(e)) => Err(e),
            Ok(Ok(ScanState::Completed)) => {
                info!("Scan {} completed", handle);
                Ok(())
            }
            Ok(Ok(state)) => Err(GuardianError::ScanAborted {
                scan_id: handle.scan_id.clone(),
                status: state.to_string(),
            }),
        }
    }

    async fn poll_until_terminal(
        &self,
        handle: &ScanHandle,
        spinner: &ProgressBar,
    ) -> Result<ScanState, GuardianError> {
        let api_key = self.api_key()?;
        let service = &self.service;
        let mut interval = self.policy.initial_interval;

        loop {
            let state = (|| async { service.scan_status(api_key, handle).await })
                .retry(self.policy.retry.clone())
                .when(is_retryable_anyhow)
                .notify(|err, dur| {
                    warn!(error = %err, delay = ?dur, "Retrying scan status query");
                })
                .await
                .map_err(|e| GuardianError::ScanFetch(format!("{:#}", e)))?;

            debug!("Scan {} status: {}", handle, state);
            spinner.set_message(format!("Scan {} is {}", handle, state));

            if state.is_terminal() {
                return Ok(state);
            }

            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(self.policy.max_interval);
        }
    }

    fn spinner(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}") {
            spinner.set_style(style);
        }
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    }

    /// Download the findings of a completed scan.
    pub async fn fetch_results(&self, handle: &ScanHandle) -> Result<ScanResult, GuardianError> {
        let api_key = self.api_key()?;

        self.service
            .scan_results(api_key, handle)
            .await
            .map_err(|e| GuardianError::ScanFetch(format!("{:#}", e)))
    }

    fn write_report_file(
        &self,
        handle: &ScanHandle,
        result: &ScanResult,
        tally: &SeverityTally,
        decision: &ReportDecision,
    ) -> Result<(), GuardianError> {
        let Some((ref path, format)) = self.report_file else {
            return Ok(());
        };

        let content = match format {
            OutputFormat::Markdown => render_comment(tally, result, handle, &self.config),
            OutputFormat::Json => {
                let report = build_scan_report(&self.config, handle, result, tally, decision);
                generate_json_report(&report).map_err(|e| report_error(path, &e))?
            }
        };

        save_report(&content, path).map_err(|e| report_error(path, &e))?;
        info!("Report saved to {}", path.display());
        Ok(())
    }

    /// Post the report on the pull request when enabled. Returns whether a comment was posted.
    pub async fn publish_comment(
        &self,
        handle: &ScanHandle,
        result: &ScanResult,
        tally: &SeverityTally,
    ) -> Result<bool, GuardianError> {
        let Some(number) = self.config.comment_target() else {
            debug!("Pull request comment not requested or not a pull request");
            return Ok(false);
        };

        let Some(ref publisher) = self.publisher else {
            warn!("Skipping pull request comment: no GitHub token configured");
            return Ok(false);
        };

        let body = render_comment(tally, result, handle, &self.config);
        let url = publisher
            .publish_comment(
                &self.config.repository_owner,
                &self.config.repository_name,
                number,
                &body,
            )
            .await
            .map_err(|e| GuardianError::CommentPublish(format!("{:#}", e)))?;

        println!("💬 Posted results to PR");
        debug!("Comment URL: {}", url);
        Ok(true)
    }

    /// Emit every known output and settle the final outcome.
    fn finalize(&mut self, progress: &RunProgress, outcome: RunOutcome) -> RunOutcome {
        let mut outputs = Vec::new();
        if let Some(found) = progress.vulnerabilities_found {
            outputs.push((OUTPUT_VULNERABILITIES_FOUND, found.to_string()));
        }
        if let Some(tally) = progress.tally {
            outputs.push((OUTPUT_CRITICAL_COUNT, tally.critical.to_string()));
        }
        if let Some(ref handle) = progress.handle {
            outputs.push((
                OUTPUT_REPORT_URL,
                report_url(&self.config.service.dashboard_url, handle),
            ));
            outputs.push((OUTPUT_SCAN_ID, handle.scan_id.clone()));
        }

        let mut outcome = outcome;
        for (name, value) in outputs {
            if let Err(e) = self.outputs.set_output(name, &value) {
                let err = GuardianError::Output {
                    name: name.to_string(),
                    message: format!("{:#}", e),
                };
                error!("{}", err);
                if outcome == RunOutcome::Passed {
                    outcome = RunOutcome::Errored {
                        message: err.to_string(),
                    };
                }
            }
        }

        match outcome {
            RunOutcome::Passed => {
                self.transition(LifecycleState::Finalized);
                println!("✅ Security scan completed successfully");
            }
            RunOutcome::CriticalThreshold { .. } => self.transition(LifecycleState::Finalized),
            RunOutcome::Errored { .. } => self.transition(LifecycleState::Failed),
        }

        outcome
    }
}

fn report_error(path: &std::path::Path, err: &anyhow::Error) -> GuardianError {
    GuardianError::Output {
        name: path.display().to_string(),
        message: format!("{:#}", err),
    }
}
