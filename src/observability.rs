// SPDX-License-Identifier: MIT
//! Correlation IDs and per-run latency metrics.
//!
//! Every review run carries one correlation ID, propagated to agents and the
//! tool service in the `X-Correlation-ID` header so a single run can be
//! traced across all three processes. The [`MetricsCollector`] is owned by
//! exactly one run; summaries use `BTreeMap` so serialized metrics are
//! deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Instant;

/// Fresh correlation ID for a run (UUID v4).
pub fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ─── Latency summaries ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub count: usize,
}

/// Aggregated metrics for one fan-out run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub correlation_id: String,
    pub total_duration_ms: u64,
    pub agents: BTreeMap<String, LatencySummary>,
    pub tools: BTreeMap<String, LatencySummary>,
}

/// Nearest-rank percentile over an already sorted sample set.
fn percentile(sorted: &[u64], pct: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

fn summarize(samples: &BTreeMap<String, Vec<u64>>) -> BTreeMap<String, LatencySummary> {
    samples
        .iter()
        .map(|(name, raw)| {
            let mut sorted = raw.clone();
            sorted.sort_unstable();
            (
                name.clone(),
                LatencySummary {
                    p50_ms: percentile(&sorted, 50.0),
                    p95_ms: percentile(&sorted, 95.0),
                    count: sorted.len(),
                },
            )
        })
        .collect()
}

// ─── Collector ───────────────────────────────────────────────────────────────

/// Collects latency samples for one run. Recording is lock-scoped and never
/// held across an await point.
#[derive(Debug)]
pub struct MetricsCollector {
    correlation_id: String,
    started: Instant,
    agent_samples: Mutex<BTreeMap<String, Vec<u64>>>,
    tool_samples: Mutex<BTreeMap<String, Vec<u64>>>,
}

impl MetricsCollector {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            started: Instant::now(),
            agent_samples: Mutex::new(BTreeMap::new()),
            tool_samples: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn record_agent_latency(&self, agent: &str, elapsed_ms: u64) {
        let mut samples = self.agent_samples.lock().unwrap_or_else(|e| e.into_inner());
        samples.entry(agent.to_string()).or_default().push(elapsed_ms);
    }

    pub fn record_tool_latency(&self, tool: &str, elapsed_ms: u64) {
        let mut samples = self.tool_samples.lock().unwrap_or_else(|e| e.into_inner());
        samples.entry(tool.to_string()).or_default().push(elapsed_ms);
    }

    /// Snapshot the run's metrics. `total_duration_ms` is wall-clock since
    /// the collector was created.
    pub fn finish(&self) -> RunMetrics {
        let agents = self.agent_samples.lock().unwrap_or_else(|e| e.into_inner());
        let tools = self.tool_samples.lock().unwrap_or_else(|e| e.into_inner());
        RunMetrics {
            correlation_id: self.correlation_id.clone(),
            total_duration_ms: self.started.elapsed().as_millis() as u64,
            agents: summarize(&agents),
            tools: summarize(&tools),
        }
    }
}
