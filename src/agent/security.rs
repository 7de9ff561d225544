// SPDX-License-Identifier: MIT
//! Security reviewer — detects hardcoded secrets in the added lines of a
//! diff.

use crate::agent::{review_skill, AgentHost, SkillError, SkillHandler};
use crate::diff::added_lines;
use crate::protocol::{AgentResponse, Finding, InvokeInput, Severity, Skill};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

pub const SKILL_ID: &str = "review.security";

struct SecretPattern {
    regex: Regex,
    title: &'static str,
    severity: Severity,
    recommendation: &'static str,
}

static SECRET_PATTERNS: Lazy<Vec<SecretPattern>> = Lazy::new(|| {
    let pattern = |raw: &str, title, severity, recommendation| SecretPattern {
        regex: Regex::new(raw).expect("SECRET_PATTERNS: invalid regex"),
        title,
        severity,
        recommendation,
    };
    vec![
        pattern(
            r#"(?i)(API_KEY|api_key|apiKey)\s*[=:]\s*["']([^"']+)["']"#,
            "API Key",
            Severity::High,
            "Move API keys to environment variables or a secrets manager",
        ),
        pattern(
            r#"(?i)(PASSWORD|password|passwd)\s*[=:]\s*["']([^"']+)["']"#,
            "Hardcoded password",
            Severity::Critical,
            "Use environment variables or a secrets manager for passwords",
        ),
        pattern(
            r#"(?i)(SECRET|secret|SECRET_KEY|secret_key)\s*[=:]\s*["']([^"']+)["']"#,
            "Hardcoded secret",
            Severity::High,
            "Move secrets to environment variables or a secrets manager",
        ),
        pattern(
            r"(sk_live_|sk_test_|pk_live_|pk_test_)[a-zA-Z0-9]+",
            "Stripe API Key",
            Severity::Critical,
            "Remove Stripe keys from code; use environment variables",
        ),
        pattern(
            r"(ghp_|gho_|ghu_|ghs_|ghr_)[a-zA-Z0-9]+",
            "GitHub Token",
            Severity::Critical,
            "Remove GitHub tokens from code; use environment variables",
        ),
    ]
});

/// Scan the diff's added lines against the secret pattern table.
pub fn analyze_diff(diff: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    for added in added_lines(diff) {
        for pattern in SECRET_PATTERNS.iter() {
            if let Some(m) = pattern.regex.find(&added.content) {
                findings.push(Finding {
                    severity: pattern.severity,
                    title: pattern.title.to_string(),
                    evidence: format!("Found: {}", m.as_str()),
                    recommendation: pattern.recommendation.to_string(),
                    file: added.file.clone(),
                    line: Some(added.line),
                });
            }
        }
    }
    findings
}

pub struct SecurityReviewer;

#[async_trait]
impl SkillHandler for SecurityReviewer {
    async fn execute(&self, input: &InvokeInput) -> Result<AgentResponse, SkillError> {
        Ok(AgentResponse::findings(analyze_diff(&input.diff)))
    }
}

pub fn skill() -> Skill {
    review_skill(
        SKILL_ID,
        "Detects hardcoded secrets and credentials in diffs",
    )
}

pub fn host() -> AgentHost {
    AgentHost::new("security-agent", env!("CARGO_PKG_VERSION"))
        .with_skill(skill(), Arc::new(SecurityReviewer))
}
