use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reviewd::{
    agent::{coverage, security, style},
    config::{DEFAULT_AGENT_PORTS, DEFAULT_TOOL_PORT},
    report,
    tool_service::{self, ToolRegistry, ToolService, ToolServiceConfig},
    Orchestrator, OrchestratorConfig,
};
use std::io::Read;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "reviewd",
    about = "Federated code-review orchestrator",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "REVIEWD_LOG")]
    log: String,
}

#[derive(Subcommand)]
enum Command {
    /// Host the tool service and the built-in review agents
    Serve {
        /// Tool-service port
        #[arg(long, default_value_t = DEFAULT_TOOL_PORT, env = "REVIEWD_TOOL_PORT")]
        tool_port: u16,
        /// Disable bearer-token auth on the tool service (testing only)
        #[arg(long)]
        no_auth: bool,
    },
    /// Review a diff: discover agents, fan out, merge, and print the report
    Review {
        /// Diff file to review; reads stdin when omitted
        #[arg(long)]
        diff: Option<std::path::PathBuf>,
        /// Agent base URLs; defaults to the built-in agents on localhost
        #[arg(long = "agent", value_name = "URL")]
        agents: Vec<String>,
        /// Tool-service URL passed to agents as mcp_url
        #[arg(long, default_value_t = format!("http://127.0.0.1:{DEFAULT_TOOL_PORT}"), env = "REVIEWD_MCP_URL")]
        mcp_url: String,
        /// Bearer token for agent and tool-service calls
        #[arg(long, default_value = "dev-token", env = "REVIEWD_TOKEN")]
        token: String,
        /// Print the merged result as JSON instead of the text report
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(&args.log)
        .compact()
        .init();

    match args.command {
        Command::Serve { tool_port, no_auth } => serve(tool_port, no_auth).await,
        Command::Review {
            diff,
            agents,
            mcp_url,
            token,
            json,
        } => review(diff, agents, mcp_url, token, json).await,
    }
}

async fn serve(tool_port: u16, no_auth: bool) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "reviewd starting");

    let tool_config = ToolServiceConfig {
        auth_enabled: !no_auth,
        ..ToolServiceConfig::default()
    };
    let service = ToolService::new(ToolRegistry::builtin(), tool_config);

    let [security_port, style_port, tests_port] = DEFAULT_AGENT_PORTS;
    let mut tasks = tokio::task::JoinSet::new();
    tasks.spawn(tool_service::serve(service, tool_port));
    tasks.spawn(security::host().serve(security_port));
    tasks.spawn(style::host().serve(style_port));
    tasks.spawn(coverage::host().serve(tests_port));

    // All servers run until one fails or the process is killed.
    while let Some(result) = tasks.join_next().await {
        result.context("server task panicked")??;
    }
    Ok(())
}

async fn review(
    diff_path: Option<std::path::PathBuf>,
    mut agents: Vec<String>,
    mcp_url: String,
    token: String,
    json: bool,
) -> Result<()> {
    let diff = match diff_path {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading diff from {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading diff from stdin")?;
            buf
        }
    };

    if agents.is_empty() {
        agents = DEFAULT_AGENT_PORTS
            .iter()
            .map(|port| format!("http://127.0.0.1:{port}"))
            .collect();
    }

    let orchestrator = Orchestrator::new(OrchestratorConfig {
        bearer_token: Some(token),
        ..OrchestratorConfig::default()
    });

    let (merged, outcome) = orchestrator.review(&agents, &diff, &mcp_url).await;
    info!(
        candidates = agents.len(),
        pairs = outcome.results.len(),
        correlation_id = %outcome.correlation_id,
        "review complete"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&merged)?);
    } else {
        print!("{}", report::render_report(&merged));
        for result in outcome.results.iter().filter(|r| r.error.is_some()) {
            eprintln!(
                "warning: {} ({}) failed: {}",
                result.agent_name,
                result.skill_id,
                result.error.as_deref().unwrap_or_default()
            );
        }
    }
    Ok(())
}
