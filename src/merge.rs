// SPDX-License-Identifier: MIT
//! Deterministic merge of invocation results.
//!
//! Findings are flattened in result order, deduplicated by
//! `title|file|line` (first occurrence wins), then totally ordered:
//! severity descending, file ascending, line ascending, title ascending.
//! The order is total, so identical inputs always serialize to
//! byte-identical JSON.

use crate::invoker::{InvokeResult, ToolRun};
use crate::observability::RunMetrics;
use crate::protocol::{Finding, Severity};
use serde::Serialize;
use std::collections::HashSet;

/// Finding counts with every severity key always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    fn tally(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MergedReviewResult {
    pub findings: Vec<Finding>,
    pub by_severity: SeverityCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_runs: Option<Vec<ToolRun>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<RunMetrics>,
}

/// Merge without run metrics attached.
pub fn merge_results(results: &[InvokeResult]) -> MergedReviewResult {
    merge(results, None)
}

/// Merge with the run's metrics attached to the report.
pub fn merge_results_with_metrics(
    results: &[InvokeResult],
    metrics: RunMetrics,
) -> MergedReviewResult {
    merge(results, Some(metrics))
}

fn merge(results: &[InvokeResult], metrics: Option<RunMetrics>) -> MergedReviewResult {
    let mut seen = HashSet::new();
    let mut findings: Vec<Finding> = results
        .iter()
        .flat_map(|result| result.findings.iter())
        .filter(|finding| seen.insert(finding.signature()))
        .cloned()
        .collect();

    findings.sort_by(|a, b| {
        b.severity
            .rank()
            .cmp(&a.severity.rank())
            .then_with(|| a.file.as_deref().unwrap_or("").cmp(b.file.as_deref().unwrap_or("")))
            .then_with(|| a.line.unwrap_or(0).cmp(&b.line.unwrap_or(0)))
            .then_with(|| a.title.cmp(&b.title))
    });

    let by_severity = SeverityCounts::tally(&findings);

    let tool_runs: Vec<ToolRun> = results
        .iter()
        .flat_map(|result| result.tool_runs.iter().cloned())
        .collect();

    MergedReviewResult {
        findings,
        by_severity,
        tool_runs: (!tool_runs.is_empty()).then_some(tool_runs),
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity, title: &str, file: Option<&str>, line: Option<u32>) -> Finding {
        Finding {
            severity,
            title: title.to_string(),
            evidence: "evidence".to_string(),
            recommendation: "recommendation".to_string(),
            file: file.map(str::to_string),
            line,
        }
    }

    fn result_with(findings: Vec<Finding>) -> InvokeResult {
        InvokeResult {
            agent_name: "agent".to_string(),
            skill_id: "skill".to_string(),
            findings,
            error: None,
            retried: false,
            duration_ms: 1,
            tool_runs: Vec::new(),
        }
    }

    #[test]
    fn sorts_by_severity_then_file_line_title() {
        let results = vec![result_with(vec![
            finding(Severity::Low, "z", Some("a.rs"), Some(1)),
            finding(Severity::Critical, "pw", Some("b.rs"), Some(9)),
            finding(Severity::High, "key", Some("a.rs"), Some(5)),
            finding(Severity::High, "key", Some("a.rs"), Some(2)),
            finding(Severity::High, "abc", Some("a.rs"), Some(2)),
        ])];

        let merged = merge_results(&results);
        let order: Vec<(u8, &str, u32, &str)> = merged
            .findings
            .iter()
            .map(|f| {
                (
                    f.severity.rank(),
                    f.file.as_deref().unwrap_or(""),
                    f.line.unwrap_or(0),
                    f.title.as_str(),
                )
            })
            .collect();
        assert_eq!(
            order,
            vec![
                (3, "b.rs", 9, "pw"),
                (2, "a.rs", 2, "abc"),
                (2, "a.rs", 2, "key"),
                (2, "a.rs", 5, "key"),
                (0, "a.rs", 1, "z"),
            ]
        );
    }

    #[test]
    fn missing_file_sorts_before_named_files() {
        let results = vec![result_with(vec![
            finding(Severity::High, "b", Some("a.rs"), Some(1)),
            finding(Severity::High, "a", None, None),
        ])];
        let merged = merge_results(&results);
        assert_eq!(merged.findings[0].title, "a");
        assert_eq!(merged.findings[1].title, "b");
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let first = result_with(vec![finding(Severity::High, "dup", Some("a.rs"), Some(3))]);
        let second = result_with(vec![
            finding(Severity::High, "dup", Some("a.rs"), Some(3)),
            finding(Severity::High, "dup", Some("a.rs"), Some(4)),
        ]);
        let merged = merge_results(&[first, second]);
        assert_eq!(merged.findings.len(), 2);
        assert_eq!(merged.by_severity.high, 2);
    }

    #[test]
    fn by_severity_has_all_keys_even_when_empty() {
        let merged = merge_results(&[]);
        assert_eq!(merged.by_severity, SeverityCounts::default());
        let json = serde_json::to_value(&merged).unwrap();
        for key in ["critical", "high", "medium", "low"] {
            assert_eq!(json["by_severity"][key], 0, "missing key {key}");
        }
        assert!(json.get("tool_runs").is_none());
    }

    #[test]
    fn failed_results_contribute_no_findings() {
        let mut failure = result_with(vec![]);
        failure.error = Some("Timeout after 5000ms".to_string());
        let ok = result_with(vec![finding(Severity::Medium, "m", None, None)]);
        let merged = merge_results(&[failure, ok]);
        assert_eq!(merged.findings.len(), 1);
        assert_eq!(merged.by_severity.medium, 1);
    }

    #[test]
    fn identical_inputs_serialize_identically() {
        let results = vec![result_with(vec![
            finding(Severity::Critical, "pw", Some("b.rs"), Some(9)),
            finding(Severity::High, "key", Some("a.rs"), Some(5)),
        ])];
        let a = serde_json::to_string(&merge_results(&results)).unwrap();
        let b = serde_json::to_string(&merge_results(&results)).unwrap();
        assert_eq!(a, b);
    }
}
