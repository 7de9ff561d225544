// SPDX-License-Identifier: MIT
//! Agent invocation — the resilience envelope around one (agent, skill)
//! call.
//!
//! `invoke_agent` never fails at the type level: every outcome, including
//! timeouts, open circuits, and negotiation breakdowns, comes back as an
//! [`InvokeResult`] with the failure encoded in `error`.
//!
//! Control flow is a bounded state machine: at most
//! `max_negotiation_rounds` rounds, each producing one of
//! final-findings / need-context / fail. Within a round, at most
//! `1 + max_retries` send attempts; only transient transport failures are
//! retried. All tool calls for round *r* complete before the round *r+1*
//! agent call begins.

use crate::circuit_breaker::{BreakerRegistry, CircuitBreaker};
use crate::config::OrchestratorConfig;
use crate::discovery::DiscoveredAgent;
use crate::observability::MetricsCollector;
use crate::protocol::{
    AgentResponse, Finding, NeedMoreInfo, ToolCallResponse, JSONRPC_VERSION, RPC_METHOD_INVOKE,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// One tool invocation made on an agent's behalf during negotiation.
#[derive(Debug, Clone, Serialize)]
pub struct ToolRun {
    pub tool: String,
    pub request_type: String,
    pub ok: bool,
    pub duration_ms: u64,
}

/// The outcome of invoking one (agent, skill) pair.
#[derive(Debug, Clone, Serialize)]
pub struct InvokeResult {
    pub agent_name: String,
    pub skill_id: String,
    pub findings: Vec<Finding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retried: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_runs: Vec<ToolRun>,
}

// ─── Transport-error classification ──────────────────────────────────────────

/// Message fragments that mark a transport failure as transient.
const RETRYABLE_MARKERS: &[&str] = &[
    "timeout",
    "aborted",
    "econnrefused",
    "econnreset",
    "network",
    "unable to connect",
    "connection refused",
];

pub(crate) fn is_retryable_transport_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    RETRYABLE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Full `cause: cause: ...` chain — reqwest's top-level Display alone often
/// hides the interesting part ("connection refused") in a source error.
fn error_chain(err: reqwest::Error) -> String {
    format!("{:#}", anyhow::Error::from(err))
}

fn is_timeout_shaped(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("timeout") || lower.contains("abort")
}

enum AttemptError {
    /// The armed deadline fired.
    Timeout,
    /// Non-2xx HTTP response. Never retried.
    Http(u16),
    /// Connection-level failure, classified by message.
    Transport(String),
}

enum RoundOutcome {
    Final(Vec<Finding>),
    NeedContext(NeedMoreInfo),
    /// Terminal failure; breaker bookkeeping already done.
    Fail(String),
}

// ─── Invoker ─────────────────────────────────────────────────────────────────

/// Invokes agents and tools with timeouts, a single classified retry, and
/// per-endpoint circuit breaking. Cheap to clone; clones share the breaker
/// registry.
#[derive(Clone)]
pub struct Invoker {
    client: reqwest::Client,
    config: Arc<OrchestratorConfig>,
    breakers: Arc<BreakerRegistry>,
}

impl Invoker {
    pub fn new(
        client: reqwest::Client,
        config: Arc<OrchestratorConfig>,
        breakers: Arc<BreakerRegistry>,
    ) -> Self {
        Self {
            client,
            config,
            breakers,
        }
    }

    /// Invoke one skill on one agent, negotiating tool context as needed.
    pub async fn invoke_agent(
        &self,
        agent: &DiscoveredAgent,
        skill_id: &str,
        diff: &str,
        mcp_url: &str,
        correlation_id: &str,
        metrics: &MetricsCollector,
    ) -> InvokeResult {
        let started = Instant::now();
        let breaker = self.breakers.breaker_for(&agent.card.endpoint).await;
        let mut context: Map<String, Value> = Map::new();
        let mut retried = false;
        let mut tool_runs: Vec<ToolRun> = Vec::new();

        for round in 1..=self.config.max_negotiation_rounds {
            let outcome = self
                .invoke_round(
                    agent,
                    skill_id,
                    diff,
                    mcp_url,
                    &context,
                    correlation_id,
                    round,
                    &breaker,
                    &mut retried,
                )
                .await;

            let request = match outcome {
                RoundOutcome::Final(findings) => {
                    breaker.record_success().await;
                    let duration_ms = started.elapsed().as_millis() as u64;
                    metrics.record_agent_latency(&agent.card.name, duration_ms);
                    debug!(
                        agent = %agent.card.name,
                        skill = skill_id,
                        findings = findings.len(),
                        duration_ms,
                        "agent review complete"
                    );
                    return InvokeResult {
                        agent_name: agent.card.name.clone(),
                        skill_id: skill_id.to_string(),
                        findings,
                        error: None,
                        retried,
                        duration_ms,
                        tool_runs,
                    };
                }
                RoundOutcome::Fail(message) => {
                    return failed(agent, skill_id, message, retried, started, tool_runs);
                }
                RoundOutcome::NeedContext(request) => request,
            };

            // The agent answered the protocol correctly — any failure past
            // this point belongs to the tool service, not the agent.
            breaker.record_success().await;

            let Some(tool) = request.request_params.tool.clone() else {
                return failed(
                    agent,
                    skill_id,
                    format!("Agent requested {} but tool call failed", request.request_type),
                    retried,
                    started,
                    tool_runs,
                );
            };

            debug!(
                agent = %agent.card.name,
                tool = %tool,
                request_type = %request.request_type,
                round,
                "agent requested additional context"
            );
            let tool_started = Instant::now();
            match self
                .call_tool(
                    mcp_url,
                    &tool,
                    &request.request_params.args,
                    correlation_id,
                    &mut retried,
                )
                .await
            {
                Ok(response) if response.ok => {
                    let elapsed = tool_started.elapsed().as_millis() as u64;
                    metrics.record_tool_latency(&tool, elapsed);
                    tool_runs.push(ToolRun {
                        tool,
                        request_type: request.request_type.clone(),
                        ok: true,
                        duration_ms: elapsed,
                    });
                    context.insert(
                        request.request_type.clone(),
                        Value::String(response.stdout),
                    );
                }
                Ok(response) => {
                    tool_runs.push(ToolRun {
                        tool: tool.clone(),
                        request_type: request.request_type.clone(),
                        ok: false,
                        duration_ms: tool_started.elapsed().as_millis() as u64,
                    });
                    let mut message = format!(
                        "Agent requested {} via {} but tool call failed",
                        request.request_type, tool
                    );
                    if !response.stderr.is_empty() {
                        message.push_str(": ");
                        message.push_str(&response.stderr);
                    }
                    return failed(agent, skill_id, message, retried, started, tool_runs);
                }
                Err(transport) => {
                    tool_runs.push(ToolRun {
                        tool: tool.clone(),
                        request_type: request.request_type.clone(),
                        ok: false,
                        duration_ms: tool_started.elapsed().as_millis() as u64,
                    });
                    return failed(
                        agent,
                        skill_id,
                        format!(
                            "Agent requested {} via {} but tool call failed: {}",
                            request.request_type, tool, transport
                        ),
                        retried,
                        started,
                        tool_runs,
                    );
                }
            }
        }

        // Every round ended in another context request.
        breaker.record_failure().await;
        warn!(
            agent = %agent.card.name,
            skill = skill_id,
            rounds = self.config.max_negotiation_rounds,
            "negotiation rounds exhausted"
        );
        failed(
            agent,
            skill_id,
            format!(
                "Max negotiation rounds ({}) exceeded",
                self.config.max_negotiation_rounds
            ),
            retried,
            started,
            tool_runs,
        )
    }

    /// One negotiation round: at most `1 + max_retries` send attempts.
    #[allow(clippy::too_many_arguments)]
    async fn invoke_round(
        &self,
        agent: &DiscoveredAgent,
        skill_id: &str,
        diff: &str,
        mcp_url: &str,
        context: &Map<String, Value>,
        correlation_id: &str,
        round: u32,
        breaker: &CircuitBreaker,
        retried: &mut bool,
    ) -> RoundOutcome {
        let timeout_ms = self.config.agent_timeout.as_millis() as u64;
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            if !breaker.is_available().await {
                return RoundOutcome::Fail(format!(
                    "Circuit breaker open for {}",
                    agent.card.name
                ));
            }

            let body = json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": format!("req-{round}-{attempt}"),
                "method": RPC_METHOD_INVOKE,
                "params": {
                    "skill": skill_id,
                    "input": {
                        "diff": diff,
                        "mcp_url": mcp_url,
                        "additional_context": context,
                    }
                }
            });

            match self
                .send_json(&agent.card.endpoint, &body, correlation_id, self.config.agent_timeout)
                .await
            {
                Ok(value) => {
                    if let Some(error) = value.get("error") {
                        breaker.record_failure().await;
                        let message = error
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("agent returned an error")
                            .to_string();
                        return RoundOutcome::Fail(message);
                    }
                    let result = value.get("result").cloned().unwrap_or(Value::Null);
                    match AgentResponse::from_result_value(&result) {
                        Ok(AgentResponse::Review(review)) => {
                            if review.findings.iter().any(|f| !f.is_valid()) {
                                breaker.record_failure().await;
                                return RoundOutcome::Fail(
                                    "Invalid agent response: finding failed validation"
                                        .to_string(),
                                );
                            }
                            return RoundOutcome::Final(review.findings);
                        }
                        Ok(AgentResponse::NeedMoreInfo(request)) => {
                            return RoundOutcome::NeedContext(request);
                        }
                        Err(e) => {
                            breaker.record_failure().await;
                            return RoundOutcome::Fail(format!("Invalid agent response: {e}"));
                        }
                    }
                }
                Err(AttemptError::Http(status)) => {
                    breaker.record_failure().await;
                    return RoundOutcome::Fail(format!("HTTP {status}"));
                }
                Err(AttemptError::Timeout) => {
                    if attempt <= self.config.max_retries {
                        debug!(agent = %agent.card.name, attempt, "attempt timed out — retrying");
                        *retried = true;
                        continue;
                    }
                    breaker.record_failure().await;
                    return RoundOutcome::Fail(format!("Timeout after {timeout_ms}ms"));
                }
                Err(AttemptError::Transport(message)) => {
                    if is_retryable_transport_error(&message) && attempt <= self.config.max_retries
                    {
                        debug!(
                            agent = %agent.card.name,
                            attempt,
                            err = %message,
                            "transient transport failure — retrying"
                        );
                        *retried = true;
                        continue;
                    }
                    breaker.record_failure().await;
                    if is_timeout_shaped(&message) {
                        return RoundOutcome::Fail(format!("Timeout after {timeout_ms}ms"));
                    }
                    return RoundOutcome::Fail(message);
                }
            }
        }
    }

    /// Call the tool service. Same retry envelope as agent calls but with
    /// the tool timeout; failures here never touch the agent's breaker.
    async fn call_tool(
        &self,
        mcp_url: &str,
        tool: &str,
        args: &Value,
        correlation_id: &str,
        retried: &mut bool,
    ) -> Result<ToolCallResponse, String> {
        let url = format!("{}/call", mcp_url.trim_end_matches('/'));
        let timeout_ms = self.config.tool_timeout.as_millis() as u64;
        let body = json!({"tool": tool, "args": args});
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self
                .send_tool_call(&url, &body, correlation_id)
                .await
            {
                Ok(response) => return Ok(response),
                Err(AttemptError::Http(status)) => return Err(format!("HTTP {status}")),
                Err(AttemptError::Timeout) => {
                    if attempt <= self.config.max_retries {
                        debug!(tool, attempt, "tool call timed out — retrying");
                        *retried = true;
                        continue;
                    }
                    return Err(format!("Timeout after {timeout_ms}ms"));
                }
                Err(AttemptError::Transport(message)) => {
                    if is_retryable_transport_error(&message) && attempt <= self.config.max_retries
                    {
                        debug!(tool, attempt, err = %message, "tool transport failure — retrying");
                        *retried = true;
                        continue;
                    }
                    if is_timeout_shaped(&message) {
                        return Err(format!("Timeout after {timeout_ms}ms"));
                    }
                    return Err(message);
                }
            }
        }
    }

    async fn send_tool_call(
        &self,
        url: &str,
        body: &Value,
        correlation_id: &str,
    ) -> Result<ToolCallResponse, AttemptError> {
        let send = async {
            let mut request = self
                .client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .header("X-Correlation-ID", correlation_id)
                .json(body);
            if let Some(token) = &self.config.bearer_token {
                request = request.bearer_auth(token);
            }
            let response = request
                .send()
                .await
                .map_err(|e| AttemptError::Transport(error_chain(e)))?;
            let status = response.status().as_u16();
            // Auth rejections carry ToolCallResponse bodies on 401/403 —
            // surface those as handled failures rather than bare statuses.
            match response.json::<ToolCallResponse>().await {
                Ok(payload) => Ok(payload),
                Err(e) if (200..300).contains(&status) => {
                    Err(AttemptError::Transport(error_chain(e)))
                }
                Err(_) => Err(AttemptError::Http(status)),
            }
        };
        match tokio::time::timeout(self.config.tool_timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(AttemptError::Timeout),
        }
    }

    async fn send_json(
        &self,
        endpoint: &str,
        body: &Value,
        correlation_id: &str,
        timeout: std::time::Duration,
    ) -> Result<Value, AttemptError> {
        let send = async {
            let mut request = self
                .client
                .post(endpoint)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .header("X-Correlation-ID", correlation_id)
                .json(body);
            if let Some(token) = &self.config.bearer_token {
                request = request.bearer_auth(token);
            }
            let response = request
                .send()
                .await
                .map_err(|e| AttemptError::Transport(error_chain(e)))?;
            let status = response.status();
            if !status.is_success() {
                return Err(AttemptError::Http(status.as_u16()));
            }
            response
                .json::<Value>()
                .await
                .map_err(|e| AttemptError::Transport(error_chain(e)))
        };
        match tokio::time::timeout(timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(AttemptError::Timeout),
        }
    }
}

fn failed(
    agent: &DiscoveredAgent,
    skill_id: &str,
    message: String,
    retried: bool,
    started: Instant,
    tool_runs: Vec<ToolRun>,
) -> InvokeResult {
    warn!(agent = %agent.card.name, skill = skill_id, error = %message, "invocation failed");
    InvokeResult {
        agent_name: agent.card.name.clone(),
        skill_id: skill_id.to_string(),
        findings: Vec::new(),
        error: Some(message),
        retried,
        duration_ms: started.elapsed().as_millis() as u64,
        tool_runs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_matches_known_transients_case_insensitively() {
        for message in [
            "request Timeout",
            "operation was ABORTED",
            "tcp connect error: ECONNREFUSED",
            "econnreset by peer",
            "network unreachable",
            "Unable to connect to host",
            "error trying to connect: Connection refused (os error 111)",
        ] {
            assert!(is_retryable_transport_error(message), "{message:?}");
        }
    }

    #[test]
    fn classifier_rejects_permanent_failures() {
        for message in [
            "invalid TLS certificate",
            "body decode failed",
            "dns error: name not resolved",
        ] {
            assert!(!is_retryable_transport_error(message), "{message:?}");
        }
    }

    #[test]
    fn timeout_shaped_messages_are_normalized() {
        assert!(is_timeout_shaped("operation timed out: timeout"));
        assert!(is_timeout_shaped("request aborted"));
        assert!(!is_timeout_shaped("connection refused"));
    }
}
