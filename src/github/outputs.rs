//! Step outputs and failure annotations for GitHub Actions.
//!
//! Outputs are appended to the file named by `GITHUB_OUTPUT`. Outside of
//! Actions they are printed as `name=value` lines instead.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Output names published by every run.
pub const OUTPUT_VULNERABILITIES_FOUND: &str = "vulnerabilities-found";
pub const OUTPUT_CRITICAL_COUNT: &str = "critical-count";
pub const OUTPUT_REPORT_URL: &str = "report-url";
pub const OUTPUT_SCAN_ID: &str = "scan-id";

/// Destination for machine-readable step outputs.
pub trait OutputSink: Send + Sync {
    fn set_output(&self, name: &str, value: &str) -> Result<()>;
}

/// Writes outputs the way the Actions runner expects.
#[derive(Debug, Clone, Default)]
pub struct ActionOutputs {
    output_file: Option<PathBuf>,
}

impl ActionOutputs {
    /// Use `GITHUB_OUTPUT` when the runner provides it.
    pub fn from_env() -> Self {
        match std::env::var_os("GITHUB_OUTPUT").filter(|v| !v.is_empty()) {
            Some(path) => Self::to_file(path),
            None => Self::default(),
        }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            output_file: Some(path.into()),
        }
    }
}

impl OutputSink for ActionOutputs {
    fn set_output(&self, name: &str, value: &str) -> Result<()> {
        let line = format_output(name, value);

        match &self.output_file {
            Some(path) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                file.write_all(line.as_bytes())
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                debug!("Set output {}={}", name, value);
            }
            None => print!("{}", line),
        }

        Ok(())
    }
}

/// Format one output entry, using a heredoc delimiter for multi-line values.
fn format_output(name: &str, value: &str) -> String {
    if value.contains('\n') {
        let mut delimiter = String::from("XEOPS_EOF");
        while value.contains(&delimiter) {
            delimiter.push('_');
        }
        format!("{name}<<{delimiter}\n{value}\n{delimiter}\n")
    } else {
        format!("{name}={value}\n")
    }
}

/// Emit a workflow error annotation so the failure shows on the run summary.
pub fn annotate_failure(message: &str) {
    // Annotation data must not contain raw newlines.
    let escaped = message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A");
    println!("::error::{}", escaped);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_output() {
        assert_eq!(format_output("scan-id", "scan-123"), "scan-id=scan-123\n");
    }

    #[test]
    fn test_multi_line_output_uses_delimiter() {
        let formatted = format_output("body", "line one\nline two");
        assert_eq!(formatted, "body<<XEOPS_EOF\nline one\nline two\nXEOPS_EOF\n");

        let formatted = format_output("body", "XEOPS_EOF\nx");
        assert!(formatted.starts_with("body<<XEOPS_EOF_\n"));
    }

    #[test]
    fn test_outputs_append_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("github_output");
        std::fs::write(&path, "existing=1\n").unwrap();

        let outputs = ActionOutputs::to_file(&path);
        outputs.set_output(OUTPUT_VULNERABILITIES_FOUND, "2").unwrap();
        outputs.set_output(OUTPUT_CRITICAL_COUNT, "1").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "existing=1\nvulnerabilities-found=2\ncritical-count=1\n"
        );
    }

    #[test]
    fn test_unwritable_output_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = ActionOutputs::to_file(dir.path().join("missing").join("out"));
        assert!(outputs.set_output(OUTPUT_SCAN_ID, "x").is_err());
    }
}
