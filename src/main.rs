//! price-tracker entry point.
//!
//! `serve` starts the HTTP server with REST and WebSocket endpoints and,
//! when enabled, the interval sweep. `sweep` runs a single sweep and exits.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use price_tracker::config::TrackerConfig;
use price_tracker::startup;

#[derive(Debug, Parser)]
#[command(name = "price-tracker", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP/WebSocket server (default).
    Serve,
    /// Run one polling sweep and exit.
    Sweep,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = TrackerConfig::from_env()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;

    init_tracing(config.log_json);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Sweep => sweep_once(config).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn serve(config: TrackerConfig) -> anyhow::Result<()> {
    tracing::info!(addr = %config.listen_addr, "starting price-tracker");

    let state = startup::build_state(&config).await?;

    if config.poll_enabled {
        tracing::info!(
            interval_secs = config.poll_interval_secs,
            "interval sweep enabled"
        );
        let _sweeper = Arc::clone(&state.scheduler).spawn(config.poll_interval());
    }

    let app = startup::router(
        state,
        std::time::Duration::from_secs(config.request_timeout_secs),
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn sweep_once(config: TrackerConfig) -> anyhow::Result<()> {
    let state = startup::build_state(&config).await?;
    let report = state.scheduler.run_sweep().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
