// SPDX-License-Identifier: MIT
//! Tool service — the shared diagnostics endpoint agents call during
//! negotiation.
//!
//! Axum HTTP server, loopback only. Endpoints:
//!   GET  /tools    — tool catalog
//!   POST /call     — authenticated tool invocation
//!   GET  /health   — liveness
//!
//! `/call` authorization pipeline (when auth is enabled):
//!   1. Bearer extraction  → 401, error_code -32001
//!   2. Token lookup       → 401, error_code -32001
//!   3. Body/schema parse  → 400
//!   4. Permission check   → 403, error_code -32003
//!   5. Tool existence     → 400
//!   6. Execute            → 200 regardless of handler `ok`
//! With auth disabled, steps 1, 2, and 4 are skipped.

pub mod registry;

pub use registry::{TokenPermissions, ToolRegistry};

use crate::protocol::{
    ToolCallRequest, ToolCallResponse, ToolCatalog, PERMISSION_DENIED, UNAUTHORIZED_TOKEN,
};
use anyhow::Result;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ToolServiceConfig {
    /// When false, any caller may invoke any registered tool (test mode).
    pub auth_enabled: bool,
    pub permissions: TokenPermissions,
}

impl Default for ToolServiceConfig {
    fn default() -> Self {
        Self {
            auth_enabled: true,
            permissions: TokenPermissions::demo(),
        }
    }
}

pub struct ToolService {
    registry: ToolRegistry,
    config: ToolServiceConfig,
    started_at: Instant,
}

impl ToolService {
    pub fn new(registry: ToolRegistry, config: ToolServiceConfig) -> Self {
        Self {
            registry,
            config,
            started_at: Instant::now(),
        }
    }
}

/// Bind to loopback and serve until the task is dropped.
pub async fn serve(service: ToolService, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("127.0.0.1:{port}").parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, auth = service.config.auth_enabled, "tool service listening");
    serve_on(service, listener).await
}

/// Serve on an already bound listener (tests bind port 0 and read the
/// local address back).
pub async fn serve_on(service: ToolService, listener: TcpListener) -> Result<()> {
    let router = build_router(Arc::new(service));
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(service: Arc<ToolService>) -> Router {
    Router::new()
        .route("/tools", get(catalog))
        .route("/call", post(call))
        .route("/health", get(health))
        .with_state(service)
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn catalog(State(service): State<Arc<ToolService>>) -> Json<ToolCatalog> {
    Json(ToolCatalog {
        tools: service.registry.definitions(),
    })
}

async fn health(State(service): State<Arc<ToolService>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "tool-service",
        "uptime_secs": service.started_at.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Bearer token from the Authorization header, scheme case-insensitive.
/// `None` when the header is missing or malformed.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

async fn call(
    State(service): State<Arc<ToolService>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<ToolCallResponse>) {
    // 1 + 2: authentication.
    let token = if service.config.auth_enabled {
        let Some(token) = bearer_token(&headers) else {
            warn!("tool call rejected: missing or malformed Authorization header");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ToolCallResponse::denied(
                    "Missing or malformed Authorization header",
                    UNAUTHORIZED_TOKEN,
                )),
            );
        };
        if !service.config.permissions.knows(token) {
            warn!("tool call rejected: unknown token");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ToolCallResponse::denied("Invalid token", UNAUTHORIZED_TOKEN)),
            );
        }
        Some(token)
    } else {
        None
    };

    // 3: body parse + schema check.
    let request: ToolCallRequest = match serde_json::from_str(&body) {
        Ok(req) => req,
        Err(e) => {
            debug!(err = %e, "tool call rejected: malformed body");
            return (
                StatusCode::BAD_REQUEST,
                Json(ToolCallResponse::failure(format!("Invalid request body: {e}"))),
            );
        }
    };

    // 4: per-token tool permission.
    if let Some(token) = token {
        if !service.config.permissions.allows(token, &request.tool) {
            warn!(tool = %request.tool, "tool call rejected: permission denied");
            return (
                StatusCode::FORBIDDEN,
                Json(ToolCallResponse::denied(
                    format!("Token does not have permission to call tool '{}'", request.tool),
                    PERMISSION_DENIED,
                )),
            );
        }
    }

    // 5: allowlist check.
    if !service.registry.contains(&request.tool) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ToolCallResponse::failure(format!("Unknown tool: {}", request.tool))),
        );
    }

    // 6: execute. HTTP 200 whether or not the handler reports ok.
    let started = Instant::now();
    let response = service
        .registry
        .call(&request.tool, &request.args)
        .unwrap_or_else(|| ToolCallResponse::failure(format!("Unknown tool: {}", request.tool)));
    debug!(
        tool = %request.tool,
        ok = response.ok,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "tool executed"
    );
    (StatusCode::OK, Json(response))
}
