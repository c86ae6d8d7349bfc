//! Scan report generation.
//!
//! Builds the Markdown body posted on pull requests and the JSON record
//! written with `--output`.

use crate::analysis::{report_url, top_criticals};
use crate::config::ScanConfiguration;
use crate::models::{
    ReportDecision, ReportMetadata, ScanHandle, ScanReport, ScanResult, Severity, SeverityTally,
};
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;

/// Most critical findings listed in a comment; the rest live behind the report link.
pub const MAX_CRITICAL_ENTRIES: usize = 3;

const VSCODE_EXTENSION_URL: &str =
    "https://marketplace.visualstudio.com/items?itemName=xeops.xeops-guardian";

/// Render the pull request comment for a finished scan.
pub fn render_comment(
    tally: &SeverityTally,
    result: &ScanResult,
    handle: &ScanHandle,
    config: &ScanConfiguration,
) -> String {
    let mut output = String::new();

    output.push_str("## 🛡️ XeOps Guardian - Security Analysis\n\n");
    output.push_str(&generate_header_section(tally, handle, config));
    output.push_str(&generate_assessment_section(tally, result.len()));
    output.push_str(&generate_criticals_section(tally, result));

    if config.generate_exploits {
        output.push_str("### 🔥 Exploit Generation\n");
        output.push_str(
            "✅ Exploit PoCs have been generated and verified for critical vulnerabilities.\n\n",
        );
    }

    output.push_str(&generate_next_steps_section(tally));
    output.push_str(&generate_footer(&report_url(
        &config.service.dashboard_url,
        handle,
    )));

    output
}

fn generate_header_section(
    tally: &SeverityTally,
    handle: &ScanHandle,
    config: &ScanConfiguration,
) -> String {
    let status = if tally.has_criticals() {
        "❌ Vulnerabilities Detected"
    } else {
        "✅ Secure"
    };

    format!(
        "**Scan ID:** {}\n**Status:** {}\n**Mode:** {}\n\n",
        handle,
        status,
        config.mode_label()
    )
}

fn generate_assessment_section(tally: &SeverityTally, vulnerabilities_found: usize) -> String {
    let mut section = String::new();

    section.push_str("### 📊 Vulnerability Assessment\n");
    for (severity, count) in [
        (Severity::Critical, tally.critical),
        (Severity::High, tally.high),
        (Severity::Medium, tally.medium),
        (Severity::Low, tally.low),
    ] {
        section.push_str(&format!(
            "- {} **{}:** {}\n",
            severity.emoji(),
            severity,
            count
        ));
    }
    section.push_str(&format!(
        "\n**Total:** {} vulnerabilities found\n\n",
        vulnerabilities_found
    ));

    section
}

fn generate_criticals_section(tally: &SeverityTally, result: &ScanResult) -> String {
    if !tally.has_criticals() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("### ⚠️ Critical Vulnerabilities\n");

    for vuln in top_criticals(result, MAX_CRITICAL_ENTRIES) {
        section.push_str(&format!(
            "- **{}** in `{}`\n",
            vuln.title,
            vuln.file.as_deref().unwrap_or("unknown")
        ));
        if let Some(ref description) = vuln.description {
            section.push_str(&format!("  {}\n", description));
        }
    }
    section.push('\n');

    section
}

fn generate_next_steps_section(tally: &SeverityTally) -> String {
    let steps = if tally.has_criticals() {
        "1. Review the full report for detailed exploitation paths\n\
         2. Apply recommended fixes\n\
         3. Re-run the scan to verify remediation"
    } else {
        "✅ No critical issues found. Continue with confidence!"
    };

    format!("### 🎯 Next Steps\n{}\n\n", steps)
}

fn generate_footer(report_url: &str) -> String {
    let mut footer = String::new();

    footer.push_str(&format!(
        "[📊 View Full Report]({}) | [🎮 VS Code Extension]({})\n\n",
        report_url, VSCODE_EXTENSION_URL
    ));
    footer.push_str("---\n");
    footer.push_str(
        "*Powered by [XeOps Guardian](https://www.xeops.ai) - AI Ethical Hacking for Security Teams*\n",
    );

    footer
}

/// Assemble the serializable record of a run.
pub fn build_scan_report(
    config: &ScanConfiguration,
    handle: &ScanHandle,
    result: &ScanResult,
    tally: &SeverityTally,
    decision: &ReportDecision,
) -> ScanReport {
    ScanReport {
        metadata: ReportMetadata {
            repository: config.repository(),
            commit_sha: config.commit_sha.clone(),
            scan_type: config.scan_type,
            scan_id: handle.scan_id.clone(),
            generated_at: Utc::now(),
        },
        summary: *tally,
        vulnerabilities_found: result.len(),
        decision: decision.clone(),
        vulnerabilities: result.vulnerabilities.clone(),
    }
}

/// Generate a JSON report.
pub fn generate_json_report(report: &ScanReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered report content to a file.
pub fn save_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
