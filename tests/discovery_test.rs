//! Discovery filtering: protocol gating, unreachable candidates, card
//! validation, and input-order preservation.

use axum::{routing::get, Json, Router};
use reviewd::agent::{security, style};
use reviewd::{Orchestrator, OrchestratorConfig};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;

async fn start_builtin(host: reviewd::agent::AgentHost) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = host.serve_on(listener).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("http://{addr}")
}

/// Serve an arbitrary card JSON at the well-known path. `make_card` receives
/// the server's origin so the endpoint can point back at it (or not, for the
/// mismatch test).
async fn start_card_server(make_card: impl Fn(&str) -> Value) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let card = make_card(&format!("http://{addr}"));
    let router = Router::new().route(
        "/.well-known/agent-card.json",
        get(move || {
            let card = card.clone();
            async move { Json(card) }
        }),
    );
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("http://{addr}")
}

fn card_with_version(origin: &str, protocol_version: &str) -> Value {
    json!({
        "name": "versioned-agent",
        "version": "0.1.0",
        "protocol_version": protocol_version,
        "endpoint": format!("{origin}/rpc"),
        "skills": [{
            "id": "review.security",
            "version": "1.0",
            "description": "security review",
            "input_schema": {"type": "object", "required": ["diff", "mcp_url"]},
            "output_schema": {"type": "object", "required": ["findings"]}
        }],
        "auth": {"type": "none"}
    })
}

/// A loopback URL nothing is listening on.
fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

fn orchestrator() -> Orchestrator {
    Orchestrator::new(OrchestratorConfig::fast())
}

#[tokio::test]
async fn discovers_builtin_agents() {
    let base = start_builtin(security::host()).await;
    let agents = orchestrator().discover(&[base.clone()]).await;
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].card.name, "security-agent");
    assert_eq!(agents[0].base_url, base);
    assert!(!agents[0].card.skills.is_empty());
}

#[tokio::test]
async fn major_version_mismatch_is_dropped() {
    let base = start_card_server(|origin| card_with_version(origin, "2.0")).await;
    let agents = orchestrator().discover(&[base]).await;
    assert!(agents.is_empty());
}

#[tokio::test]
async fn minor_version_mismatch_is_accepted() {
    let base = start_card_server(|origin| card_with_version(origin, "1.5")).await;
    let agents = orchestrator().discover(&[base]).await;
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].card.protocol_version, "1.5");
}

#[tokio::test]
async fn malformed_version_is_dropped() {
    let base = start_card_server(|origin| card_with_version(origin, "one.zero")).await;
    assert!(orchestrator().discover(&[base]).await.is_empty());
}

#[tokio::test]
async fn unreachable_url_reduces_result_by_one() {
    let real = start_builtin(security::host()).await;
    let fake = unreachable_url();
    let agents = orchestrator().discover(&[real, fake]).await;
    assert_eq!(agents.len(), 1);
}

#[tokio::test]
async fn survivors_preserve_input_order() {
    let security_base = start_builtin(security::host()).await;
    let style_base = start_builtin(style::host()).await;
    let fake = unreachable_url();

    let agents = orchestrator()
        .discover(&[style_base.clone(), fake, security_base.clone()])
        .await;
    assert_eq!(agents.len(), 2);
    assert_eq!(agents[0].card.name, "style-agent");
    assert_eq!(agents[1].card.name, "security-agent");
}

#[tokio::test]
async fn card_with_foreign_endpoint_is_dropped() {
    let base = start_card_server(|_origin| {
        let mut card = card_with_version("http://10.9.8.7:1234", "1.0");
        card["name"] = json!("hijacker");
        card
    })
    .await;
    assert!(orchestrator().discover(&[base]).await.is_empty());
}

#[tokio::test]
async fn bearer_auth_agents_are_discoverable() {
    use reviewd::protocol::AuthType;
    let base = start_builtin(security::host().with_auth(AuthType::Bearer)).await;
    let agents = orchestrator().discover(&[base]).await;
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].card.auth.auth_type, AuthType::Bearer);
}

#[tokio::test]
async fn card_without_skills_is_dropped() {
    let base = start_card_server(|origin| {
        let mut card = card_with_version(origin, "1.0");
        card["skills"] = json!([]);
        card
    })
    .await;
    assert!(orchestrator().discover(&[base]).await.is_empty());
}
