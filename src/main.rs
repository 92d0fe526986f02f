//! Tool runtime HTTP server.
//!
//! Loads the JSON configuration, builds every enabled tool exactly once and
//! serves the plan and chain endpoints until Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! tool-runtime --config config.json --port 8080
//! ```

mod config;
mod server;
mod tools;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agent_core::{AgentRuntime, Dependencies, ToolRegistry};
use anyhow::{Context, Result};
use clap::Parser;
use llm_router::LlmRouter;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::server::{app_router, AppState};

#[derive(Debug, Parser)]
#[command(name = "tool-runtime", version, about = "Serve LLM planned tool calls over HTTP")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Port to listen on, overrides `server_port`
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "debug"
    } else {
        "info,tool_runtime=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let config = AppConfig::load(&args.config)?;
    info!(path = %args.config.display(), "configuration loaded");

    let router = LlmRouter::new(&config.model).context("failed to initialise language model")?;
    let model = router.route();

    let mut registry = ToolRegistry::new();
    tools::register_enabled(&mut registry, &config.enabled_tools)?;
    let built = registry
        .construct_all(&config.tools, &Dependencies::new(model.clone()))
        .await
        .context("failed to initialise tools")?;
    info!(tools = built, "tool registry ready");

    let runtime = AgentRuntime::builder(model)
        .with_registry(Arc::new(registry))
        .with_model_options(config.planner.clone())
        .with_chain(config.chain.clone())
        .build();
    let state = AppState::new(runtime, Duration::from_millis(config.request_timeout_ms));

    let port = args.port.unwrap_or(config.server_port);
    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!("tool runtime listening on {}", bind_addr);

    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
