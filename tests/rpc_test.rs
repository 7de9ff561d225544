//! Agent-side RPC contract tests over real HTTP.
//!
//! Spins the built-in security agent on a random loopback port and checks
//! the discovery endpoints plus the JSON-RPC error-code mapping.

use reviewd::agent::{security, AgentHost};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;

async fn start_agent(host: AgentHost) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = host.serve_on(listener).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("http://{addr}")
}

async fn rpc(base: &str, body: &str) -> Value {
    reqwest::Client::new()
        .post(format!("{base}/rpc"))
        .header("Content-Type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

fn invoke_body(skill: &str, diff: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": "req-1",
        "method": "invoke",
        "params": {
            "skill": skill,
            "input": {"diff": diff, "mcp_url": "http://127.0.0.1:9100", "additional_context": {}}
        }
    })
    .to_string()
}

#[tokio::test]
async fn agent_card_is_served_at_well_known_path() {
    let base = start_agent(security::host()).await;
    let card: Value = reqwest::get(format!("{base}/.well-known/agent-card.json"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(card["name"], "security-agent");
    assert_eq!(card["protocol_version"], "1.0");
    assert_eq!(card["endpoint"], format!("{base}/rpc"));
    assert_eq!(card["auth"]["type"], "none");
    let skills = card["skills"].as_array().unwrap();
    assert_eq!(skills.len(), 1);
    assert_eq!(skills[0]["id"], "review.security");
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let base = start_agent(security::host()).await;
    let response = reqwest::get(format!("{base}/health")).await.unwrap();
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn secret_detection_via_single_agent() {
    let base = start_agent(security::host()).await;
    let response = rpc(
        &base,
        &invoke_body("review.security", "+API_KEY='test'\n+PASSWORD='secret'"),
    )
    .await;

    assert!(response.get("error").is_none(), "unexpected error: {response}");
    let findings = response["result"]["findings"].as_array().unwrap();
    assert!(findings.len() >= 2, "expected >= 2 findings, got {}", findings.len());

    let api_key = findings.iter().find(|f| f["title"] == "API Key").unwrap();
    assert_eq!(api_key["severity"], "high");
    let password = findings
        .iter()
        .find(|f| f["title"] == "Hardcoded password")
        .unwrap();
    assert_eq!(password["severity"], "critical");
}

#[tokio::test]
async fn empty_diff_returns_zero_findings() {
    let base = start_agent(security::host()).await;
    let response = rpc(&base, &invoke_body("review.security", "")).await;
    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["findings"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn invalid_json_body_yields_parse_error() {
    let base = start_agent(security::host()).await;
    let response = rpc(&base, "{ invalid json }").await;
    assert_eq!(response["error"]["code"], -32700);
}

#[tokio::test]
async fn unknown_method_yields_method_not_found() {
    let base = start_agent(security::host()).await;
    let body = json!({"jsonrpc": "2.0", "id": "r", "method": "nonexistent", "params": {}});
    let response = rpc(&base, &body.to_string()).await;
    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn non_string_diff_yields_invalid_params() {
    let base = start_agent(security::host()).await;
    let body = json!({
        "jsonrpc": "2.0",
        "id": "r",
        "method": "invoke",
        "params": {
            "skill": "review.security",
            "input": {"diff": 12345, "mcp_url": "http://127.0.0.1:9100"}
        }
    });
    let response = rpc(&base, &body.to_string()).await;
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn unknown_skill_yields_invalid_params_not_internal_error() {
    let base = start_agent(security::host()).await;
    let response = rpc(&base, &invoke_body("review.nonexistent", "+x")).await;
    assert_eq!(response["error"]["code"], -32602);
    assert!(response["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Unknown skill"));
}

#[tokio::test]
async fn invalid_envelope_yields_invalid_request() {
    let base = start_agent(security::host()).await;
    let body = json!({"jsonrpc": "2.0", "id": 42, "method": "invoke", "params": {}});
    let response = rpc(&base, &body.to_string()).await;
    assert_eq!(response["error"]["code"], -32600);
}
