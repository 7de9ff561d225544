// SPDX-License-Identifier: MIT
//! reviewd — a federated code-review orchestrator.
//!
//! The control plane discovers specialist review agents over HTTP, fans a
//! unified diff out to every advertised skill concurrently, satisfies
//! mid-review tool requests through a shared tool service, and merges the
//! findings into one deterministic report.

pub mod agent;
pub mod circuit_breaker;
pub mod config;
pub mod diff;
pub mod discovery;
pub mod fanout;
pub mod invoker;
pub mod merge;
pub mod observability;
pub mod protocol;
pub mod report;
pub mod tool_service;

pub use config::OrchestratorConfig;

use circuit_breaker::BreakerRegistry;
use discovery::DiscoveredAgent;
use fanout::RunOutcome;
use invoker::Invoker;
use merge::MergedReviewResult;
use std::sync::Arc;

/// The orchestrator: one HTTP client, one process-wide breaker registry,
/// and the immutable configuration everything reads from.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<OrchestratorConfig>,
    client: reqwest::Client,
    breakers: Arc<BreakerRegistry>,
    invoker: Invoker,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        let config = Arc::new(config);
        let client = reqwest::Client::new();
        let breakers = Arc::new(BreakerRegistry::new(config.breaker.clone()));
        let invoker = Invoker::new(client.clone(), Arc::clone(&config), Arc::clone(&breakers));
        Self {
            config,
            client,
            breakers,
            invoker,
        }
    }

    /// The shared per-endpoint circuit-breaker table.
    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    /// Probe the candidate base URLs and keep the compatible agents.
    pub async fn discover(&self, base_urls: &[String]) -> Vec<DiscoveredAgent> {
        discovery::discover_agents(&self.client, base_urls, &self.config).await
    }

    /// Fan the diff out across every (agent, skill) pair.
    pub async fn run(
        &self,
        agents: &[DiscoveredAgent],
        diff: &str,
        mcp_url: &str,
        correlation_id: Option<String>,
    ) -> RunOutcome {
        fanout::invoke_all_agents_with_metrics(&self.invoker, agents, diff, mcp_url, correlation_id)
            .await
    }

    /// Discover, fan out, and merge in one call.
    pub async fn review(
        &self,
        base_urls: &[String],
        diff: &str,
        mcp_url: &str,
    ) -> (MergedReviewResult, RunOutcome) {
        let agents = self.discover(base_urls).await;
        let outcome = self.run(&agents, diff, mcp_url, None).await;
        let merged = merge::merge_results_with_metrics(&outcome.results, outcome.metrics.clone());
        (merged, outcome)
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}
