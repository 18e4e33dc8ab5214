use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

mod config;
mod server;
mod telemetry;

use crate::config::RelayConfig;

/// imrelay - WebSocket presence and messaging relay
#[derive(Parser)]
#[command(name = "imrelay-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "IMRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Listener address, overrides the configuration file
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut relay_config = RelayConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        relay_config.bind_addr = bind;
        relay_config.validate()?;
    }

    telemetry::init(relay_config.log_format)
        .map_err(|e| anyhow::anyhow!("Failed to init telemetry: {}", e))?;

    info!("imrelay server starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    relay_config.log_config();

    server::start(relay_config).await?;

    info!("imrelay server stopped");

    Ok(())
}
