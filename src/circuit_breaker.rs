// SPDX-License-Identifier: MIT
//! Circuit breaker for agent endpoints.
//!
//! Protects the fan-out from endpoints that are down: after repeated
//! failures the circuit opens and invocations fail fast instead of burning a
//! full timeout per attempt.
//!
//! # State machine
//!
//! ```text
//! Closed ──(failure_threshold failures)──► Open
//!   ▲                                       │
//!   └────(success)──── HalfOpen ◄──(cooldown elapsed)──┘
//! ```
//!
//! - **Closed**: calls allowed, failures counted.
//! - **Open**: calls rejected until `cooldown` has elapsed since the last
//!   failure, then the breaker moves to HalfOpen and admits one probe.
//! - **HalfOpen**: the probe call is allowed; a success closes the circuit,
//!   a failure reopens it.
//!
//! A success in *any* state resets the failure count and closes the circuit.
//! Breakers live in a process-wide [`BreakerRegistry`] keyed by endpoint URL
//! and are shared by all concurrent runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Observable state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Point-in-time snapshot of one endpoint's breaker, for inspection/tests.
#[derive(Debug, Clone)]
pub struct CircuitStatus {
    pub state: CircuitState,
    pub failures: u32,
    pub last_failure: Option<Instant>,
}

/// Configuration for a [`CircuitBreaker`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    ///
    /// Default: 3
    pub failure_threshold: u32,
    /// How long the circuit stays Open before admitting a probe.
    ///
    /// Default: 30 seconds
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            last_failure: None,
        }
    }
}

/// Thread-safe per-endpoint circuit breaker.
///
/// Cheaply cloneable — all clones share the same state via `Arc`.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<RwLock<BreakerInner>>,
    config: Arc<CircuitBreakerConfig>,
    endpoint: Arc<str>,
}

impl CircuitBreaker {
    pub fn new(endpoint: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(BreakerInner::new())),
            config: Arc::new(config),
            endpoint: Arc::from(endpoint.into().as_str()),
        }
    }

    /// Returns `true` if a call should be attempted.
    ///
    /// - `Closed` / `HalfOpen` → `true`
    /// - `Open` → `false`, unless `cooldown` has elapsed since the last
    ///   failure, in which case the breaker transitions to `HalfOpen` and
    ///   returns `true` for the probe.
    pub async fn is_available(&self) -> bool {
        {
            let inner = self.inner.read().await;
            match inner.state {
                CircuitState::Closed | CircuitState::HalfOpen => return true,
                CircuitState::Open => {
                    if let Some(last) = inner.last_failure {
                        if last.elapsed() < self.config.cooldown {
                            return false;
                        }
                    }
                }
            }
        }

        // Cooldown elapsed — upgrade to a write lock and re-check, another
        // task may have transitioned the state in between.
        let mut inner = self.inner.write().await;
        if inner.state == CircuitState::Open {
            match inner.last_failure {
                Some(last) if last.elapsed() < self.config.cooldown => return false,
                _ => {
                    info!(endpoint = %self.endpoint, "circuit breaker → half_open (probe)");
                    inner.state = CircuitState::HalfOpen;
                }
            }
        }
        true
    }

    /// Record a successful call: resets the failure count and closes the
    /// circuit regardless of the current state.
    pub async fn record_success(&self) {
        let mut inner = self.inner.write().await;
        if inner.state != CircuitState::Closed {
            info!(endpoint = %self.endpoint, "circuit breaker → closed (recovered)");
        }
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.last_failure = None;
    }

    /// Record a failed call.
    ///
    /// Closed: increments the counter; at `failure_threshold` the circuit
    /// opens. HalfOpen: the probe failed — reopen.
    pub async fn record_failure(&self) {
        let mut inner = self.inner.write().await;
        inner.last_failure = Some(Instant::now());
        inner.failures += 1;
        match inner.state {
            CircuitState::Closed => {
                if inner.failures >= self.config.failure_threshold {
                    warn!(
                        endpoint = %self.endpoint,
                        failures = inner.failures,
                        "circuit breaker → open (threshold reached)"
                    );
                    inner.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!(endpoint = %self.endpoint, "circuit breaker → open (probe failed)");
                inner.state = CircuitState::Open;
            }
            CircuitState::Open => {}
        }
    }

    pub async fn status(&self) -> CircuitStatus {
        let inner = self.inner.read().await;
        CircuitStatus {
            state: inner.state,
            failures: inner.failures,
            last_failure: inner.last_failure,
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Process-wide table of breakers keyed by endpoint URL.
///
/// Shared across concurrent runs; never exposed as a free global — inject it
/// where it is needed.
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: RwLock<HashMap<String, CircuitBreaker>>,
    config: CircuitBreakerConfig,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Fetch (or lazily create) the breaker for an endpoint.
    pub async fn breaker_for(&self, endpoint: &str) -> CircuitBreaker {
        if let Some(breaker) = self.breakers.read().await.get(endpoint) {
            return breaker.clone();
        }
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(endpoint.to_string())
            .or_insert_with(|| CircuitBreaker::new(endpoint, self.config.clone()))
            .clone()
    }

    /// Snapshot one endpoint's breaker state, if it has been used.
    pub async fn status(&self, endpoint: &str) -> Option<CircuitStatus> {
        match self.breakers.read().await.get(endpoint) {
            Some(breaker) => Some(breaker.status().await),
            None => None,
        }
    }

    /// Drop all breaker state. Test hook.
    pub async fn reset(&self) {
        self.breakers.write().await.clear();
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
