//! Trendwire Signal Engine Main Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use trendwire_signals::{Engine, EngineConfig, HttpBarSource, WebhookNotifier};

#[derive(Debug, Parser)]
#[command(name = "trendwire_signals", about = "Multi-timeframe trend signal engine")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "configs/trendwire.toml")]
    config: PathBuf,

    /// Run one diagnostic evaluation cycle and exit.
    #[arg(long)]
    once: bool,

    /// In one-shot mode, actually dispatch a confirmed signal.
    #[arg(long, requires = "once")]
    send: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("Starting Trendwire Signal Engine");

    let config = EngineConfig::load(Some(&cli.config))
        .context("Failed to load signal engine configuration")?;
    info!(
        "Configuration loaded: {} on {} timeframes",
        config.symbol,
        config.timeframes.len()
    );

    let engine = build_engine(config).context("Failed to initialize signal engine")?;

    if cli.once {
        let outcome = engine
            .run_once(cli.send)
            .await
            .context("One-shot evaluation failed")?;
        info!(?outcome, "One-shot evaluation finished");
        return Ok(());
    }

    let engine_handle = tokio::spawn(async move {
        if let Err(e) = engine.run().await {
            error!("Signal engine halted: {e}");
        }
    });

    info!("Signal engine running. Press Ctrl+C to stop.");

    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down signal engine");
    engine_handle.abort();

    Ok(())
}

fn build_engine(config: EngineConfig) -> Result<Engine> {
    let source = Arc::new(
        HttpBarSource::from_config(&config.source)
            .context("Failed to initialize bar source")?,
    );
    let notifier = Arc::new(
        WebhookNotifier::from_config(&config.dispatch)
            .context("Failed to initialize webhook notifier")?,
    );
    Engine::new(config, source, notifier).context("Failed to assemble engine")
}
