// SPDX-License-Identifier: MIT
//! Agent discovery — parallel fetch and filtering of agent cards.
//!
//! Each candidate base URL is probed at `/.well-known/agent-card.json`. A
//! card is accepted only if it parses, validates structurally, and speaks a
//! compatible protocol major. Anything else drops the candidate with a
//! warning; discovery never fails the run.

use crate::config::OrchestratorConfig;
use crate::protocol::{card::validate_card, is_protocol_compatible, AgentCard};
use tracing::{debug, warn};
use url::Url;

/// An agent that passed discovery. Lives for one run.
#[derive(Debug, Clone)]
pub struct DiscoveredAgent {
    pub card: AgentCard,
    pub base_url: String,
}

/// The well-known card path, per the A2A convention.
pub const AGENT_CARD_PATH: &str = "/.well-known/agent-card.json";

fn card_url(base: &str) -> String {
    format!("{}{AGENT_CARD_PATH}", base.trim_end_matches('/'))
}

/// Probe every base URL concurrently and return the survivors in input
/// order.
pub async fn discover_agents(
    client: &reqwest::Client,
    base_urls: &[String],
    config: &OrchestratorConfig,
) -> Vec<DiscoveredAgent> {
    let handles: Vec<_> = base_urls
        .iter()
        .map(|base| {
            let client = client.clone();
            let base = base.clone();
            let timeout = config.agent_timeout;
            tokio::spawn(async move { fetch_card(&client, &base, timeout).await })
        })
        .collect();

    let mut discovered = Vec::new();
    for (base, handle) in base_urls.iter().zip(handles) {
        let card = match handle.await {
            Ok(Ok(card)) => card,
            Ok(Err(reason)) => {
                warn!(base_url = %base, reason = %reason, "dropping agent candidate");
                continue;
            }
            Err(e) => {
                warn!(base_url = %base, err = %e, "discovery task failed");
                continue;
            }
        };

        if !is_protocol_compatible(&card.protocol_version, &config.supported_protocol_version) {
            warn!(
                base_url = %base,
                agent_version = %card.protocol_version,
                supported = %config.supported_protocol_version,
                "dropping agent candidate: incompatible protocol version"
            );
            continue;
        }

        debug!(base_url = %base, agent = %card.name, skills = card.skills.len(), "agent discovered");
        discovered.push(DiscoveredAgent {
            card,
            base_url: base.clone(),
        });
    }
    discovered
}

async fn fetch_card(
    client: &reqwest::Client,
    base: &str,
    timeout: std::time::Duration,
) -> Result<AgentCard, String> {
    let base_url = Url::parse(base).map_err(|e| format!("invalid base URL: {e}"))?;

    let response = tokio::time::timeout(timeout, client.get(card_url(base)).send())
        .await
        .map_err(|_| "card fetch timed out".to_string())?
        .map_err(|e| format!("card fetch failed: {e}"))?;

    if !response.status().is_success() {
        return Err(format!("card fetch returned HTTP {}", response.status().as_u16()));
    }

    let card: AgentCard = response
        .json()
        .await
        .map_err(|e| format!("card parse failed: {e}"))?;

    validate_card(&card, &base_url).map_err(|e| e.to_string())?;
    Ok(card)
}
