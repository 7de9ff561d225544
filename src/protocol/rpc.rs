// SPDX-License-Identifier: MIT
//! JSON-RPC 2.0 envelope types and error codes.
//!
//! The federation speaks plain JSON-RPC 2.0 over HTTP POST. Only one method
//! exists: `invoke`. Error envelopes are always returned with HTTP 200 —
//! non-2xx statuses are reserved for transport and auth failures.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// The single RPC method agents are required to support.
pub const RPC_METHOD_INVOKE: &str = "invoke";

// ─── Error codes ─────────────────────────────────────────────────────────────

/// Request body is not valid JSON.
pub const PARSE_ERROR: i32 = -32700;
/// Envelope does not match the JSON-RPC schema.
pub const INVALID_REQUEST: i32 = -32600;
/// Method name other than `invoke`.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Params schema mismatch, unknown skill id, or missing required input field.
pub const INVALID_PARAMS: i32 = -32602;
/// Error raised inside skill execution.
pub const INTERNAL_ERROR: i32 = -32603;
/// Missing or invalid bearer token (tool service).
pub const UNAUTHORIZED_TOKEN: i32 = -32001;
/// Token lacks permission for the requested tool.
pub const PERMISSION_DENIED: i32 = -32003;

// ─── Envelope ────────────────────────────────────────────────────────────────

/// An inbound JSON-RPC request, before params validation.
///
/// `id` is kept as a raw [`Value`] so a malformed envelope can still be
/// answered with the caller's id echoed back; only string ids are accepted,
/// which [`RpcRequest::validate_envelope`] enforces.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    /// Check the envelope invariants: version `"2.0"` and a string `id`.
    pub fn validate_envelope(&self) -> Result<(), String> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(format!("unsupported jsonrpc version: {:?}", self.jsonrpc));
        }
        if !self.id.is_string() {
            return Err("id must be a string".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}
