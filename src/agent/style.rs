// SPDX-License-Identifier: MIT
//! Style reviewer — low-severity nits over the added lines of a diff.

use crate::agent::{review_skill, AgentHost, SkillError, SkillHandler};
use crate::diff::added_lines;
use crate::protocol::{AgentResponse, Finding, InvokeInput, Severity, Skill};
use async_trait::async_trait;
use std::sync::Arc;

pub const SKILL_ID: &str = "review.style";

const MAX_LINE_LENGTH: usize = 120;

pub fn analyze_diff(diff: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut nit = |title: &str, evidence: String, recommendation: &str, file: &Option<String>, line: u32| {
        findings.push(Finding {
            severity: Severity::Low,
            title: title.to_string(),
            evidence,
            recommendation: recommendation.to_string(),
            file: file.clone(),
            line: Some(line),
        });
    };

    for added in added_lines(diff) {
        if added.content.len() > MAX_LINE_LENGTH {
            nit(
                "Overlong line",
                format!("{} characters", added.content.len()),
                "Wrap lines at 120 characters",
                &added.file,
                added.line,
            );
        }
        if added.content.ends_with(' ') || added.content.ends_with('\t') {
            nit(
                "Trailing whitespace",
                format!("Found: {:?}", added.content.trim_start()),
                "Strip trailing whitespace",
                &added.file,
                added.line,
            );
        }
        let trimmed = added.content.trim_start();
        if trimmed.contains("TODO") || trimmed.contains("FIXME") {
            nit(
                "Leftover TODO marker",
                format!("Found: {trimmed}"),
                "Resolve or file the TODO before merging",
                &added.file,
                added.line,
            );
        }
    }
    findings
}

pub struct StyleReviewer;

#[async_trait]
impl SkillHandler for StyleReviewer {
    async fn execute(&self, input: &InvokeInput) -> Result<AgentResponse, SkillError> {
        Ok(AgentResponse::findings(analyze_diff(&input.diff)))
    }
}

pub fn skill() -> Skill {
    review_skill(SKILL_ID, "Flags whitespace, line-length, and TODO nits in diffs")
}

pub fn host() -> AgentHost {
    AgentHost::new("style-agent", env!("CARGO_PKG_VERSION"))
        .with_skill(skill(), Arc::new(StyleReviewer))
}
