// SPDX-License-Identifier: MIT
//! Unified-diff walking shared by the built-in reviewers and tools.
//!
//! Only added lines matter to a review of a change, so the walker tracks the
//! post-image position: file names come from `+++ b/` headers, line numbers
//! from `@@ -a,b +c,d @@` hunk headers, and context lines advance the
//! counter while deletions do not.

use once_cell::sync::Lazy;
use regex::Regex;

/// One `+` line of a unified diff, located in the post-image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedLine {
    pub file: Option<String>,
    pub line: u32,
    pub content: String,
}

static HUNK_NEW_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+(\d+)").expect("HUNK_NEW_START: invalid regex"));

/// Collect all added lines with their file and post-image line number.
pub fn added_lines(diff: &str) -> Vec<AddedLine> {
    let mut added = Vec::new();
    let mut current_file: Option<String> = None;
    let mut current_line: u32 = 0;

    for line in diff.lines() {
        if let Some(path) = line.strip_prefix("+++ b/") {
            current_file = Some(path.to_string());
            continue;
        }
        if line.starts_with("@@ ") {
            if let Some(cap) = HUNK_NEW_START.captures(line) {
                current_line = cap[1].parse::<u32>().unwrap_or(1).saturating_sub(1);
            }
            continue;
        }
        if let Some(content) = line.strip_prefix('+') {
            if line.starts_with("+++") {
                continue;
            }
            current_line += 1;
            added.push(AddedLine {
                file: current_file.clone(),
                line: current_line,
                content: content.to_string(),
            });
        } else if line.starts_with(' ') {
            current_line += 1;
        }
    }

    added
}

/// Paths touched by the diff, in order of first appearance.
pub fn changed_files(diff: &str) -> Vec<String> {
    let mut files = Vec::new();
    for line in diff.lines() {
        if let Some(path) = line.strip_prefix("+++ b/") {
            if !files.iter().any(|f| f == path) {
                files.push(path.to_string());
            }
        }
    }
    files
}

/// Heuristic: does this path look like a test file?
pub fn is_test_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.contains("/tests/")
        || lower.starts_with("tests/")
        || lower.contains("_test.")
        || lower.contains(".test.")
        || lower.contains(".spec.")
        || lower
            .rsplit('/')
            .next()
            .map(|name| name.starts_with("test_"))
            .unwrap_or(false)
}

/// Paths introduced by the diff (preceded by a `--- /dev/null` header).
pub fn new_files(diff: &str) -> Vec<String> {
    let mut files = Vec::new();
    let mut prev_was_dev_null = false;
    for line in diff.lines() {
        if line.starts_with("--- /dev/null") {
            prev_was_dev_null = true;
            continue;
        }
        if prev_was_dev_null {
            if let Some(path) = line.strip_prefix("+++ b/") {
                files.push(path.to_string());
            }
        }
        prev_was_dev_null = false;
    }
    files
}
