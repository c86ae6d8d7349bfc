//! GitHub Actions run context.
//!
//! Reads the repository identity, commit and triggering event from the
//! variables the Actions runner exports, plus the pull request number from
//! the event payload file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// Event name GitHub uses for pull request triggers.
pub const PULL_REQUEST_EVENT: &str = "pull_request";

/// Read-only identity of the CI run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiContext {
    pub owner: String,
    pub repo: String,
    pub sha: String,
    pub event_name: String,
    pub pull_request_number: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    #[serde(default)]
    pull_request: Option<PullRequestRef>,
}

#[derive(Debug, Deserialize)]
struct PullRequestRef {
    number: u64,
}

impl CiContext {
    /// Load the context from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the context through an arbitrary variable lookup.
    ///
    /// A missing `GITHUB_REPOSITORY` leaves owner and repo empty so that
    /// command-line overrides can still fill them in.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut context = CiContext {
            sha: lookup("GITHUB_SHA").unwrap_or_default(),
            event_name: lookup("GITHUB_EVENT_NAME").unwrap_or_default(),
            ..CiContext::default()
        };

        if let Some(repository) = lookup("GITHUB_REPOSITORY") {
            context.set_repository(&repository)?;
        }

        if context.is_pull_request() {
            match lookup("GITHUB_EVENT_PATH") {
                Some(path) => {
                    context.pull_request_number = read_pull_request_number(Path::new(&path))?;
                }
                None => warn!("Pull request event without GITHUB_EVENT_PATH; PR number unknown"),
            }
        }

        debug!("CI context: {:?}", context);
        Ok(context)
    }

    /// Set owner and repo from an `owner/name` string.
    pub fn set_repository(&mut self, repository: &str) -> Result<()> {
        match repository.trim().split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                self.owner = owner.to_string();
                self.repo = repo.to_string();
                Ok(())
            }
            _ => bail!(
                "Invalid repository '{}': expected the form owner/name",
                repository
            ),
        }
    }

    /// Override the triggering pull request, marking the run as a PR event.
    pub fn set_pull_request(&mut self, number: u64) {
        self.event_name = PULL_REQUEST_EVENT.to_string();
        self.pull_request_number = Some(number);
    }

    pub fn is_pull_request(&self) -> bool {
        self.event_name == PULL_REQUEST_EVENT
    }

    /// Fail if the repository identity could not be determined.
    pub fn ensure_complete(&self) -> Result<()> {
        if self.owner.is_empty() || self.repo.is_empty() {
            bail!("Repository unknown: set GITHUB_REPOSITORY or pass --repository owner/name");
        }
        if self.sha.is_empty() {
            warn!("Commit SHA unknown (GITHUB_SHA not set)");
        }
        Ok(())
    }
}

fn read_pull_request_number(path: &Path) -> Result<Option<u64>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event payload: {}", path.display()))?;

    let payload: EventPayload = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse event payload: {}", path.display()))?;

    Ok(payload.pull_request.map(|pr| pr.number))
}
