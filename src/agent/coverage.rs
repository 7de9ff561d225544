// SPDX-License-Identifier: MIT
//! Test-coverage reviewer — flags new source files added without any
//! accompanying test change in the same diff.

use crate::agent::{review_skill, AgentHost, SkillError, SkillHandler};
use crate::diff::{changed_files, is_test_path, new_files};
use crate::protocol::{AgentResponse, Finding, InvokeInput, Severity, Skill};
use async_trait::async_trait;
use std::sync::Arc;

pub const SKILL_ID: &str = "review.tests";

const SOURCE_EXTENSIONS: &[&str] = &["rs", "py", "ts", "tsx", "js", "jsx", "go", "java"];

fn is_source_path(path: &str) -> bool {
    path.rsplit('.')
        .next()
        .map(|ext| SOURCE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

pub fn analyze_diff(diff: &str) -> Vec<Finding> {
    let touches_tests = changed_files(diff).iter().any(|f| is_test_path(f));
    if touches_tests {
        return Vec::new();
    }

    new_files(diff)
        .into_iter()
        .filter(|path| is_source_path(path) && !is_test_path(path))
        .map(|path| Finding {
            severity: Severity::Medium,
            title: "Missing tests for new file".to_string(),
            evidence: format!("{path} was added without accompanying tests"),
            recommendation: "Add tests covering the new file's behavior".to_string(),
            file: Some(path),
            line: None,
        })
        .collect()
}

pub struct CoverageReviewer;

#[async_trait]
impl SkillHandler for CoverageReviewer {
    async fn execute(&self, input: &InvokeInput) -> Result<AgentResponse, SkillError> {
        Ok(AgentResponse::findings(analyze_diff(&input.diff)))
    }
}

pub fn skill() -> Skill {
    review_skill(SKILL_ID, "Flags new production files that ship without tests")
}

pub fn host() -> AgentHost {
    AgentHost::new("tests-agent", env!("CARGO_PKG_VERSION"))
        .with_skill(skill(), Arc::new(CoverageReviewer))
}
