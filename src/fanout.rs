// SPDX-License-Identifier: MIT
//! Fan-out driver — concurrent invocation across all (agent, skill) pairs.
//!
//! One task per pair, no admission control, await-all. No single agent
//! failure aborts the run; a pair that cannot produce a result still yields
//! an [`InvokeResult`] with `error` set.

use crate::discovery::DiscoveredAgent;
use crate::invoker::{InvokeResult, Invoker};
use crate::observability::{new_correlation_id, MetricsCollector, RunMetrics};
use std::sync::Arc;
use tracing::info;

/// Everything a single fan-out run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub results: Vec<InvokeResult>,
    pub metrics: RunMetrics,
    pub correlation_id: String,
}

/// Invoke every skill of every discovered agent concurrently.
///
/// A correlation ID is created when the caller does not supply one;
/// `metrics.total_duration_ms` covers the whole fan-out wall-clock.
pub async fn invoke_all_agents_with_metrics(
    invoker: &Invoker,
    agents: &[DiscoveredAgent],
    diff: &str,
    mcp_url: &str,
    correlation_id: Option<String>,
) -> RunOutcome {
    let correlation_id = correlation_id.unwrap_or_else(new_correlation_id);
    let collector = Arc::new(MetricsCollector::new(correlation_id.clone()));

    let mut labels = Vec::new();
    let mut handles = Vec::new();
    for agent in agents {
        for skill in &agent.card.skills {
            labels.push((agent.card.name.clone(), skill.id.clone()));

            let invoker = invoker.clone();
            let agent = agent.clone();
            let skill_id = skill.id.clone();
            let diff = diff.to_string();
            let mcp_url = mcp_url.to_string();
            let correlation_id = correlation_id.clone();
            let collector = Arc::clone(&collector);
            handles.push(tokio::spawn(async move {
                invoker
                    .invoke_agent(&agent, &skill_id, &diff, &mcp_url, &correlation_id, &collector)
                    .await
            }));
        }
    }

    info!(
        correlation_id = %correlation_id,
        pairs = handles.len(),
        "fanning out review"
    );

    let mut results = Vec::with_capacity(handles.len());
    for ((agent_name, skill_id), handle) in labels.into_iter().zip(handles) {
        match handle.await {
            Ok(result) => results.push(result),
            // A panicked task still yields a result row — the run goes on.
            Err(e) => results.push(InvokeResult {
                agent_name,
                skill_id,
                findings: Vec::new(),
                error: Some(format!("invocation task failed: {e}")),
                retried: false,
                duration_ms: 0,
                tool_runs: Vec::new(),
            }),
        }
    }

    RunOutcome {
        results,
        metrics: collector.finish(),
        correlation_id,
    }
}
