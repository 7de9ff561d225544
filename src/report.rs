// SPDX-License-Identifier: MIT
//! Human-readable rendering of a merged review.

use crate::merge::MergedReviewResult;
use crate::protocol::{Finding, Severity};
use std::fmt::Write;

/// Render the consolidated report: a summary line, one section per
/// non-empty severity in descending order, then the tool runs.
pub fn render_report(merged: &MergedReviewResult) -> String {
    let counts = &merged.by_severity;
    let mut out = format!(
        "Review summary: {} critical, {} high, {} medium, {} low\n",
        counts.critical, counts.high, counts.medium, counts.low
    );

    for severity in Severity::DESCENDING {
        if counts.get(severity) == 0 {
            continue;
        }
        let _ = write!(out, "\n{severity}:\n");
        for finding in merged.findings.iter().filter(|f| f.severity == severity) {
            let _ = writeln!(out, "  {}", format_finding(finding));
        }
    }

    if let Some(tool_runs) = merged.tool_runs.as_deref() {
        if !tool_runs.is_empty() {
            out.push_str("\nTool runs:\n");
            for run in tool_runs {
                let _ = writeln!(
                    out,
                    "  {} ({}): {} in {}ms",
                    run.tool,
                    run.request_type,
                    if run.ok { "ok" } else { "failed" },
                    run.duration_ms
                );
            }
        }
    }

    out
}

/// `[sev] title; evidence; recommendation[; file[:line]]`
fn format_finding(finding: &Finding) -> String {
    let mut line = format!(
        "[{}] {}; {}; {}",
        finding.severity, finding.title, finding.evidence, finding.recommendation
    );
    if let Some(file) = &finding.file {
        line.push_str("; ");
        line.push_str(file);
        if let Some(number) = finding.line {
            let _ = write!(line, ":{number}");
        }
    }
    line
}
