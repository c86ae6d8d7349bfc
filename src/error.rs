//! Error taxonomy for the scan lifecycle.
//!
//! Collaborator layers (HTTP, GitHub, file I/O) work with `anyhow::Result`;
//! the orchestrator converts their failures into a [`GuardianError`] at each
//! step boundary so the final failure message keeps the original text.

use thiserror::Error;

/// Errors that terminate an orchestration run.
#[derive(Error, Debug)]
pub enum GuardianError {
    /// A required setting is missing. Raised before any network I/O.
    #[error("{0}")]
    Configuration(String),

    /// Creating the scan failed (transport error or non-success response).
    #[error("{0}")]
    ScanSubmission(String),

    /// Querying status or downloading results failed.
    #[error("{0}")]
    ScanFetch(String),

    /// The scan did not reach a terminal state before the polling deadline.
    #[error("Scan {scan_id} did not complete within {waited_secs}s")]
    ScanTimeout { scan_id: String, waited_secs: u64 },

    /// The service reported a terminal state other than `completed`.
    #[error("Scan {scan_id} ended with status '{status}'")]
    ScanAborted { scan_id: String, status: String },

    /// Posting the pull request comment failed.
    #[error("{0}")]
    CommentPublish(String),

    /// Writing a machine-readable output failed.
    #[error("Failed to write output '{name}': {message}")]
    Output { name: String, message: String },
}

impl GuardianError {
    /// Shorthand for the missing API key configuration failure.
    pub fn missing_api_key() -> Self {
        GuardianError::Configuration(
            "Configuration error: missing API key (set XEOPS_API_KEY or pass --api-key)"
                .to_string(),
        )
    }
}
