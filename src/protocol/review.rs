// SPDX-License-Identifier: MIT
//! Findings, invoke payloads, negotiation messages, and tool-call shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─── Severity ────────────────────────────────────────────────────────────────

/// Finding severity. Variant order doubles as the sort order, and `rank`
/// gives the fixed integer used by the deterministic merge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn rank(self) -> u8 {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
            Severity::Critical => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// All severities, most severe first — the report section order.
    pub const DESCENDING: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Finding ─────────────────────────────────────────────────────────────────

/// One reviewer observation — the unit of output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub title: String,
    pub evidence: String,
    pub recommendation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Finding {
    /// Deduplication identity: `title|file|line` with missing parts empty.
    pub fn signature(&self) -> String {
        format!(
            "{}|{}|{}",
            self.title,
            self.file.as_deref().unwrap_or(""),
            self.line.map(|l| l.to_string()).unwrap_or_default()
        )
    }

    /// Structural validity: non-empty title, positive line if present.
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && self.line.map_or(true, |l| l >= 1)
    }
}

// ─── Invoke payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeInput {
    pub diff: String,
    pub mcp_url: String,
    /// Tool outputs accumulated over negotiation rounds, keyed by the
    /// `request_type` each agent asked with.
    #[serde(default)]
    pub additional_context: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeParams {
    pub skill: String,
    pub input: InvokeInput,
}

// ─── Agent responses ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResult {
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub args: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Mid-review request for additional tool output.
///
/// `request_type` is an open vocabulary defined by agents (`file_contents`,
/// `test_output`, `git_blame`, `lint_results`, `custom`, ...); the
/// orchestrator only echoes it back as the `additional_context` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeedMoreInfo {
    pub need_more_info: bool,
    pub request_type: String,
    #[serde(default)]
    pub request_params: RequestParams,
}

/// What an agent returns from `invoke`: either final findings or a request
/// for more context. The wire discriminator is the presence of
/// `need_more_info: true`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AgentResponse {
    NeedMoreInfo(NeedMoreInfo),
    Review(ReviewResult),
}

impl AgentResponse {
    /// Parse a JSON-RPC `result` value into the response union.
    pub fn from_result_value(value: &Value) -> Result<Self, serde_json::Error> {
        if value.get("need_more_info").and_then(Value::as_bool) == Some(true) {
            serde_json::from_value(value.clone()).map(AgentResponse::NeedMoreInfo)
        } else {
            serde_json::from_value(value.clone()).map(AgentResponse::Review)
        }
    }

    pub fn need_more_info(request_type: impl Into<String>, tool: Option<&str>) -> Self {
        AgentResponse::NeedMoreInfo(NeedMoreInfo {
            need_more_info: true,
            request_type: request_type.into(),
            request_params: RequestParams {
                tool: tool.map(str::to_string),
                args: Value::Null,
                description: None,
            },
        })
    }

    pub fn findings(findings: Vec<Finding>) -> Self {
        AgentResponse::Review(ReviewResult { findings })
    }
}

// ─── Tool service shapes ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCatalog {
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

/// Result of a tool call. `ok = false` is a handled-but-failed call;
/// transport and auth failures are signalled by non-200 HTTP statuses
/// (auth bodies additionally carry `error_code`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,
}

impl ToolCallResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            ok: true,
            stdout: stdout.into(),
            stderr: String::new(),
            error_code: None,
        }
    }

    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            ok: false,
            stdout: String::new(),
            stderr: stderr.into(),
            error_code: None,
        }
    }

    pub fn denied(stderr: impl Into<String>, code: i32) -> Self {
        Self {
            ok: false,
            stdout: String::new(),
            stderr: stderr.into(),
            error_code: Some(code),
        }
    }
}
