//! lightsout: tag-driven start/stop/resize scheduler for cloud resources.
//!
//! Invoked on a fixed cadence by an external scheduler. Reads all
//! configuration from the environment, reconciles every configured account
//! once, then exits. Per-resource and per-account failures are absorbed
//! into logs and notifications; only a configuration or timezone failure
//! fails the invocation.

use clap::Parser;
use tracing::info;

use lightsout_core::config::{load_dotenv, EngineConfig};

/// Tag-driven resource scheduler: one reconciliation pass per invocation.
#[derive(Parser, Debug)]
#[command(name = "lightsout", version, about)]
struct Cli {
    /// Load and log the resolved configuration, then exit.
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let default_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let cli = Cli::parse();

    let config = EngineConfig::from_env()?;
    config.log_summary();

    if cli.check_config {
        return Ok(());
    }

    let summary = lightsout_engine::run(&config).await?;
    info!(
        accounts = summary.accounts.len(),
        changes = summary.total_changes(),
        errors = summary.total_errors(),
        "invocation complete"
    );
    Ok(())
}
