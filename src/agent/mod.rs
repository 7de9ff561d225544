// SPDX-License-Identifier: MIT
//! Agent-side RPC handler.
//!
//! Everything an agent needs to be discoverable and invokable: the card at
//! `/.well-known/agent-card.json`, a `/health` probe, and the `/rpc`
//! JSON-RPC dispatcher. Skill logic plugs in behind [`SkillHandler`]; the
//! built-in reviewers (security, style, test coverage) live in the
//! submodules.
//!
//! Error envelopes are always returned with HTTP 200. The dispatch pipeline
//! maps failures to the protocol codes in order: parse (-32700), envelope
//! (-32600), method (-32601), params / unknown skill (-32602), skill
//! execution (-32603).

pub mod coverage;
pub mod security;
pub mod style;

use crate::protocol::{
    AgentAuth, AgentCard, AgentResponse, AuthType, InvokeInput, InvokeParams, RpcRequest,
    RpcResponse, Skill, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR, RPC_METHOD_INVOKE, SUPPORTED_PROTOCOL_VERSION,
};
use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

// ─── Skill seam ──────────────────────────────────────────────────────────────

/// Error raised inside skill execution; surfaces as JSON-RPC -32603.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SkillError(pub String);

/// One skill's implementation. Implementations receive the full invoke
/// input, including any `additional_context` accumulated over negotiation
/// rounds, and either return findings or ask for more context.
#[async_trait]
pub trait SkillHandler: Send + Sync {
    async fn execute(&self, input: &InvokeInput) -> Result<AgentResponse, SkillError>;
}

/// Standard skill descriptor for a diff reviewer: input requires `diff` and
/// `mcp_url`, output requires `findings`.
pub fn review_skill(id: &str, description: &str) -> Skill {
    Skill {
        id: id.to_string(),
        version: "1.0".to_string(),
        description: description.to_string(),
        input_schema: json!({
            "type": "object",
            "required": ["diff", "mcp_url"],
            "properties": {
                "diff": {"type": "string"},
                "mcp_url": {"type": "string"},
                "additional_context": {"type": "object"}
            }
        }),
        output_schema: json!({
            "type": "object",
            "required": ["findings"],
            "properties": {
                "findings": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["severity", "title", "evidence", "recommendation"],
                        "properties": {
                            "severity": {"type": "string", "enum": ["low", "medium", "high", "critical"]},
                            "title": {"type": "string"},
                            "evidence": {"type": "string"},
                            "recommendation": {"type": "string"},
                            "file": {"type": "string"},
                            "line": {"type": "integer", "minimum": 1}
                        }
                    }
                }
            }
        }),
    }
}

// ─── Host ────────────────────────────────────────────────────────────────────

/// Builder for one agent process: a name plus its skills.
pub struct AgentHost {
    name: String,
    version: String,
    auth_type: AuthType,
    skills: Vec<(Skill, Arc<dyn SkillHandler>)>,
}

impl AgentHost {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            auth_type: AuthType::None,
            skills: Vec::new(),
        }
    }

    pub fn with_auth(mut self, auth_type: AuthType) -> Self {
        self.auth_type = auth_type;
        self
    }

    pub fn with_skill(mut self, skill: Skill, handler: Arc<dyn SkillHandler>) -> Self {
        self.skills.push((skill, handler));
        self
    }

    /// The card this host serves from the given origin. The RPC endpoint is
    /// always `<origin>/rpc`.
    pub fn card_for_origin(&self, origin: &str) -> AgentCard {
        AgentCard {
            name: self.name.clone(),
            version: self.version.clone(),
            protocol_version: SUPPORTED_PROTOCOL_VERSION.to_string(),
            endpoint: format!("{}/rpc", origin.trim_end_matches('/')),
            skills: self.skills.iter().map(|(s, _)| s.clone()).collect(),
            auth: AgentAuth {
                auth_type: self.auth_type,
            },
        }
    }

    /// Router serving this agent from `origin`.
    pub fn into_router(self, origin: &str) -> Router {
        let card = self.card_for_origin(origin);
        let handlers = self
            .skills
            .into_iter()
            .map(|(skill, handler)| (skill.id, handler))
            .collect();
        let runtime = Arc::new(AgentRuntime { card, handlers });
        Router::new()
            .route("/.well-known/agent-card.json", get(agent_card))
            .route("/health", get(health))
            .route("/rpc", post(rpc))
            .with_state(runtime)
    }

    /// Serve on an already bound loopback listener; the card endpoint is
    /// derived from the listener's local address.
    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        let origin = format!("http://{addr}");
        info!(agent = %self.name, addr = %addr, "agent listening");
        let router = self.into_router(&origin);
        axum::serve(listener, router).await?;
        Ok(())
    }

    pub async fn serve(self, port: u16) -> Result<()> {
        let addr: SocketAddr = format!("127.0.0.1:{port}").parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve_on(listener).await
    }
}

struct AgentRuntime {
    card: AgentCard,
    handlers: HashMap<String, Arc<dyn SkillHandler>>,
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn agent_card(State(runtime): State<Arc<AgentRuntime>>) -> Json<AgentCard> {
    Json(runtime.card.clone())
}

async fn health(State(runtime): State<Arc<AgentRuntime>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "agent": runtime.card.name,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn rpc(State(runtime): State<Arc<AgentRuntime>>, body: String) -> Json<RpcResponse> {
    Json(dispatch(&runtime, &body).await)
}

async fn dispatch(runtime: &AgentRuntime, body: &str) -> RpcResponse {
    let raw: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return RpcResponse::error(Value::Null, PARSE_ERROR, "Parse error"),
    };

    let request: RpcRequest = match serde_json::from_value(raw) {
        Ok(req) => req,
        Err(e) => {
            return RpcResponse::error(
                Value::Null,
                INVALID_REQUEST,
                format!("Invalid Request: {e}"),
            )
        }
    };
    let id = request.id.clone();
    if let Err(e) = request.validate_envelope() {
        return RpcResponse::error(id, INVALID_REQUEST, format!("Invalid Request: {e}"));
    }

    if request.method != RPC_METHOD_INVOKE {
        return RpcResponse::error(
            id,
            METHOD_NOT_FOUND,
            format!("Method not found: {}", request.method),
        );
    }

    let params: InvokeParams = match serde_json::from_value(request.params) {
        Ok(p) => p,
        Err(e) => return RpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {e}")),
    };

    let Some(handler) = runtime.handlers.get(&params.skill) else {
        let supported: Vec<&str> = runtime.handlers.keys().map(String::as_str).collect();
        return RpcResponse::error(
            id,
            INVALID_PARAMS,
            format!(
                "Unknown skill: {}. This agent supports: {}",
                params.skill,
                supported.join(", ")
            ),
        );
    };

    debug!(agent = %runtime.card.name, skill = %params.skill, "invoking skill");
    match handler.execute(&params.input).await {
        Ok(response) => match serde_json::to_value(&response) {
            Ok(result) => RpcResponse::success(id, result),
            Err(e) => RpcResponse::error(id, INTERNAL_ERROR, format!("Internal error: {e}")),
        },
        Err(e) => RpcResponse::error(id, INTERNAL_ERROR, format!("Internal error: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Finding, Severity};
    use serde_json::json;

    struct EchoSkill;

    #[async_trait]
    impl SkillHandler for EchoSkill {
        async fn execute(&self, input: &InvokeInput) -> Result<AgentResponse, SkillError> {
            if input.diff.contains("boom") {
                return Err(SkillError("skill exploded".to_string()));
            }
            Ok(AgentResponse::findings(vec![Finding {
                severity: Severity::Low,
                title: "Echo".to_string(),
                evidence: input.diff.clone(),
                recommendation: "none".to_string(),
                file: None,
                line: None,
            }]))
        }
    }

    fn runtime() -> AgentRuntime {
        let host = AgentHost::new("echo-agent", "0.1.0")
            .with_skill(review_skill("review.echo", "echoes"), Arc::new(EchoSkill));
        let card = host.card_for_origin("http://127.0.0.1:9999");
        let handlers = host
            .skills
            .into_iter()
            .map(|(skill, handler)| (skill.id, handler))
            .collect();
        AgentRuntime { card, handlers }
    }

    fn invoke_body(skill: &str, diff: &str) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": "req-1",
            "method": "invoke",
            "params": {"skill": skill, "input": {"diff": diff, "mcp_url": "http://127.0.0.1:9100"}}
        })
        .to_string()
    }

    #[tokio::test]
    async fn invalid_json_is_parse_error() {
        let resp = dispatch(&runtime(), "{ invalid json }").await;
        assert_eq!(resp.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let body = json!({"jsonrpc": "2.0", "id": "r", "method": "nonexistent", "params": {}});
        let resp = dispatch(&runtime(), &body.to_string()).await;
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn non_string_diff_is_invalid_params() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": "r",
            "method": "invoke",
            "params": {"skill": "review.echo", "input": {"diff": 12345, "mcp_url": "http://x"}}
        });
        let resp = dispatch(&runtime(), &body.to_string()).await;
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn unknown_skill_is_invalid_params_not_internal() {
        let resp = dispatch(&runtime(), &invoke_body("review.other", "+x")).await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, INVALID_PARAMS);
        assert!(err.message.contains("Unknown skill"));
    }

    #[tokio::test]
    async fn skill_failure_is_internal_error() {
        let resp = dispatch(&runtime(), &invoke_body("review.echo", "boom")).await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, INTERNAL_ERROR);
        assert!(err.message.contains("skill exploded"));
    }

    #[tokio::test]
    async fn successful_invoke_returns_findings() {
        let resp = dispatch(&runtime(), &invoke_body("review.echo", "+ok")).await;
        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        assert_eq!(result["findings"][0]["title"], "Echo");
    }

    #[test]
    fn card_endpoint_is_origin_rpc() {
        let host = AgentHost::new("a", "0.1.0")
            .with_skill(review_skill("review.echo", "echoes"), Arc::new(EchoSkill));
        let card = host.card_for_origin("http://127.0.0.1:9201");
        assert_eq!(card.endpoint, "http://127.0.0.1:9201/rpc");
        assert_eq!(card.protocol_version, SUPPORTED_PROTOCOL_VERSION);
    }
}
