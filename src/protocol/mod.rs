// SPDX-License-Identifier: MIT
//! Wire types and validators for the review-agent federation protocol.
//!
//! Everything an agent, the tool service, or the orchestrator puts on the
//! wire is defined here: agent cards, JSON-RPC envelopes, invoke payloads,
//! findings, negotiation messages, and tool-call shapes. All inbound payloads
//! must pass validation in this module before any business logic runs.

pub mod card;
pub mod review;
pub mod rpc;

pub use card::{
    is_protocol_compatible, AgentAuth, AgentCard, AuthType, CardError, ProtocolVersion, Skill,
    SUPPORTED_PROTOCOL_VERSION,
};
pub use review::{
    AgentResponse, Finding, InvokeInput, InvokeParams, NeedMoreInfo, RequestParams, ReviewResult,
    Severity, ToolCallRequest, ToolCallResponse, ToolCatalog, ToolDefinition,
};
pub use rpc::{
    RpcError, RpcRequest, RpcResponse, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    JSONRPC_VERSION, METHOD_NOT_FOUND, PARSE_ERROR, PERMISSION_DENIED, RPC_METHOD_INVOKE,
    UNAUTHORIZED_TOKEN,
};
