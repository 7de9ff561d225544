// SPDX-License-Identifier: MIT
//! Tool registry and token permissions.
//!
//! The registry is the tool allowlist: a name is callable iff it is
//! registered here. The built-in set covers the three diagnostics review
//! agents ask for during negotiation — `lint`, `run_tests`, and `dep_audit`
//! — each a deterministic in-process scan over the diff passed in `args`.

use crate::diff;
use crate::protocol::{ToolCallResponse, ToolDefinition};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

// ─── Token permissions ───────────────────────────────────────────────────────

/// Immutable map from bearer token to the set of tools it may call.
/// Tokens absent from the map are invalid.
#[derive(Debug, Clone, Default)]
pub struct TokenPermissions {
    grants: HashMap<String, HashSet<String>>,
}

impl TokenPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, token: impl Into<String>, tools: &[&str]) -> Self {
        self.grants
            .entry(token.into())
            .or_default()
            .extend(tools.iter().map(|t| t.to_string()));
        self
    }

    /// Whether the token exists at all.
    pub fn knows(&self, token: &str) -> bool {
        self.grants.contains_key(token)
    }

    /// Whether the token may call the named tool.
    pub fn allows(&self, token: &str, tool: &str) -> bool {
        self.grants
            .get(token)
            .map(|tools| tools.contains(tool))
            .unwrap_or(false)
    }

    /// Demo grants used by `reviewd serve`: a full-access token and a
    /// lint-only one.
    pub fn demo() -> Self {
        Self::new()
            .grant("dev-token", &["lint", "run_tests", "dep_audit"])
            .grant("limited-token", &["lint"])
    }
}

// ─── Registry ────────────────────────────────────────────────────────────────

type Handler = Box<dyn Fn(&Value) -> ToolCallResponse + Send + Sync>;

struct RegisteredTool {
    definition: ToolDefinition,
    handler: Handler,
}

/// The tool allowlist plus the handlers behind it.
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Registry with the built-in diagnostic tools.
    pub fn builtin() -> Self {
        Self::new()
            .register(lint_definition(), Box::new(run_lint))
            .register(run_tests_definition(), Box::new(run_tests))
            .register(dep_audit_definition(), Box::new(run_dep_audit))
    }

    pub fn register(mut self, definition: ToolDefinition, handler: Handler) -> Self {
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                definition,
                handler,
            },
        );
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    /// Execute a registered tool. `None` when the name is unknown.
    pub fn call(&self, name: &str, args: &Value) -> Option<ToolCallResponse> {
        self.tools.get(name).map(|tool| (tool.handler)(args))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ─── Built-in tools ──────────────────────────────────────────────────────────

/// Output schema every tool shares: `ok`, `stdout`, `stderr` are mandatory.
fn tool_output_schema() -> Value {
    json!({
        "type": "object",
        "required": ["ok", "stdout", "stderr"],
        "properties": {
            "ok": {"type": "boolean"},
            "stdout": {"type": "string"},
            "stderr": {"type": "string"}
        }
    })
}

fn diff_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {"diff": {"type": "string"}}
    })
}

fn diff_arg(args: &Value) -> &str {
    args.get("diff").and_then(Value::as_str).unwrap_or("")
}

fn lint_definition() -> ToolDefinition {
    ToolDefinition {
        name: "lint".to_string(),
        description: "Style lint over the added lines of a unified diff".to_string(),
        input_schema: diff_input_schema(),
        output_schema: tool_output_schema(),
    }
}

/// Whitespace and line-length lint over the diff's added lines.
fn run_lint(args: &Value) -> ToolCallResponse {
    let mut issues = Vec::new();
    for added in diff::added_lines(diff_arg(args)) {
        let location = match &added.file {
            Some(file) => format!("{file}:{}", added.line),
            None => format!("line {}", added.line),
        };
        if added.content.len() > 120 {
            issues.push(format!("{location}: line exceeds 120 characters"));
        }
        if added.content.ends_with(' ') || added.content.ends_with('\t') {
            issues.push(format!("{location}: trailing whitespace"));
        }
        if added.content.contains('\t') {
            issues.push(format!("{location}: tab character"));
        }
    }
    let mut stdout = issues.join("\n");
    if !stdout.is_empty() {
        stdout.push('\n');
    }
    stdout.push_str(&format!("lint: {} issue(s) found", issues.len()));
    ToolCallResponse::success(stdout)
}

fn run_tests_definition() -> ToolDefinition {
    ToolDefinition {
        name: "run_tests".to_string(),
        description: "Report which test files a diff touches".to_string(),
        input_schema: diff_input_schema(),
        output_schema: tool_output_schema(),
    }
}

/// Test-touch report: which changed files are tests, which are not.
fn run_tests(args: &Value) -> ToolCallResponse {
    let files = diff::changed_files(diff_arg(args));
    let (tests, sources): (Vec<_>, Vec<_>) = files.iter().partition(|f| diff::is_test_path(f));
    let mut out = String::new();
    for t in &tests {
        out.push_str(&format!("touched test file: {t}\n"));
    }
    out.push_str(&format!(
        "test result: ok. {} test file(s) touched, {} source file(s) untested by this diff",
        tests.len(),
        sources.len()
    ));
    ToolCallResponse::success(out)
}

fn dep_audit_definition() -> ToolDefinition {
    ToolDefinition {
        name: "dep_audit".to_string(),
        description: "Flag dependency-manifest changes in a diff".to_string(),
        input_schema: diff_input_schema(),
        output_schema: tool_output_schema(),
    }
}

const MANIFEST_NAMES: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "requirements.txt",
    "go.mod",
    "pom.xml",
    "Gemfile",
];

fn run_dep_audit(args: &Value) -> ToolCallResponse {
    let changed: Vec<String> = diff::changed_files(diff_arg(args))
        .into_iter()
        .filter(|path| {
            MANIFEST_NAMES
                .iter()
                .any(|m| path == m || path.ends_with(&format!("/{m}")))
        })
        .collect();
    if changed.is_empty() {
        return ToolCallResponse::success("dep_audit: no dependency manifest changes");
    }
    let mut out = String::new();
    for file in &changed {
        out.push_str(&format!("dependency manifest changed: {file}\n"));
    }
    out.push_str(&format!("dep_audit: {} manifest(s) changed — review new dependencies", changed.len()));
    ToolCallResponse::success(out)
}
