// SPDX-License-Identifier: MIT
//! Orchestrator configuration.
//!
//! All tunables live in one immutable struct built at startup and passed in
//! at construction — nothing reads the environment at call sites.

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::protocol::SUPPORTED_PROTOCOL_VERSION;
use std::time::Duration;

/// Default tool-service port.
pub const DEFAULT_TOOL_PORT: u16 = 9100;
/// Default ports for the built-in review agents (security, style, tests).
pub const DEFAULT_AGENT_PORTS: [u16; 3] = [9201, 9202, 9203];

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Deadline for one agent RPC attempt.
    ///
    /// Default: 5 s
    pub agent_timeout: Duration,
    /// Deadline for one tool-service call attempt.
    ///
    /// Default: 3 s
    pub tool_timeout: Duration,
    /// Extra attempts after the first on transient transport failures.
    ///
    /// Default: 1
    pub max_retries: u32,
    /// Upper bound on agent invoke rounds within one invocation.
    ///
    /// Default: 2
    pub max_negotiation_rounds: u32,
    /// Per-endpoint circuit-breaker tuning.
    pub breaker: CircuitBreakerConfig,
    /// Protocol version this orchestrator accepts (major must match).
    pub supported_protocol_version: String,
    /// Bearer token sent on agent and tool-service requests, when set.
    pub bearer_token: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            agent_timeout: Duration::from_millis(5000),
            tool_timeout: Duration::from_millis(3000),
            max_retries: 1,
            max_negotiation_rounds: 2,
            breaker: CircuitBreakerConfig::default(),
            supported_protocol_version: SUPPORTED_PROTOCOL_VERSION.to_string(),
            bearer_token: None,
        }
    }
}

impl OrchestratorConfig {
    /// Timings shrunk to unit-test scale.
    pub fn fast() -> Self {
        Self {
            agent_timeout: Duration::from_millis(250),
            tool_timeout: Duration::from_millis(250),
            breaker: CircuitBreakerConfig {
                failure_threshold: 3,
                cooldown: Duration::from_millis(50),
            },
            ..Self::default()
        }
    }
}
