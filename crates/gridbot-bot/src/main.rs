//! Grid trading execution engine entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Grid trading execution engine
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via GRIDBOT_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    gridbot_telemetry::init_logging()?;

    info!("Starting gridbot v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > GRIDBOT_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("GRIDBOT_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = gridbot_bot::AppConfig::from_file(&config_path)?;
    info!(mode = config.mode.as_str(), armed = config.armed, "Configuration loaded");

    let app = gridbot_bot::Application::new(config)?;

    // The market data feed attaches here; the engine idles until a
    // sender delivers snapshots, and stops when the last one drops.
    let _ticks = app.tick_sender();

    app.run().await?;

    Ok(())
}
