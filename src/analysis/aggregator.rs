//! Result aggregation and the pass/fail policy.
//!
//! Everything here is pure: the tally is recomputed from the full result on
//! every call and the decision depends only on the tally and configuration.

use crate::models::{ReportDecision, ScanHandle, ScanResult, Severity, SeverityTally, Vulnerability};

/// Partition vulnerabilities into the four severity buckets.
///
/// Labels outside `CRITICAL`/`HIGH`/`MEDIUM`/`LOW` are counted only in
/// `unclassified`, so `total` can be lower than `result.len()`.
pub fn aggregate(result: &ScanResult) -> SeverityTally {
    let mut tally = SeverityTally::default();

    for vuln in &result.vulnerabilities {
        match vuln.level() {
            Some(Severity::Critical) => tally.critical += 1,
            Some(Severity::High) => tally.high += 1,
            Some(Severity::Medium) => tally.medium += 1,
            Some(Severity::Low) => tally.low += 1,
            None => tally.unclassified += 1,
        }
    }

    tally.total = tally.critical + tally.high + tally.medium + tally.low;
    tally
}

/// Decide whether the build fails and where the full report lives.
pub fn decide(
    tally: &SeverityTally,
    fail_on_critical: bool,
    handle: &ScanHandle,
    dashboard_url: &str,
) -> ReportDecision {
    ReportDecision {
        should_fail_build: fail_on_critical && tally.has_criticals(),
        report_url: report_url(dashboard_url, handle),
    }
}

/// Dashboard link for a scan.
pub fn report_url(dashboard_url: &str, handle: &ScanHandle) -> String {
    format!(
        "{}/dashboard/scans/{}",
        dashboard_url.trim_end_matches('/'),
        handle.scan_id
    )
}

/// The first `limit` critical findings, in service order.
pub fn top_criticals(result: &ScanResult, limit: usize) -> Vec<&Vulnerability> {
    result
        .vulnerabilities
        .iter()
        .filter(|v| v.is_critical())
        .take(limit)
        .collect()
}

/// Generate a text summary of the tally for console output.
pub fn generate_summary_text(tally: &SeverityTally, vulnerabilities_found: usize) -> String {
    let mut lines = vec![
        format!("{} Critical: {}", Severity::Critical.emoji(), tally.critical),
        format!("{} High: {}", Severity::High.emoji(), tally.high),
        format!("{} Medium: {}", Severity::Medium.emoji(), tally.medium),
        format!("{} Low: {}", Severity::Low.emoji(), tally.low),
        format!("📈 Total: {}", vulnerabilities_found),
    ];

    if tally.unclassified > 0 {
        lines.push(format!("❔ Unclassified: {}", tally.unclassified));
    }

    lines.join("\n")
}
