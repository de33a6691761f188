//! Indigo ledger node: entry point.
//!
//! Loads genesis transactions into an in-memory ledger and serves it over
//! HTTP until interrupted.

mod api;
mod config;
mod state;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use indigo_ledger::{load_genesis, InMemoryLedger};

use config::NodeConfig;
use state::NodeState;

/// Indigo ledger node
#[derive(Parser, Debug)]
#[command(name = "indigo-node", version, about = "Indigo ledger node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "indigo-node.toml")]
    config: PathBuf,

    /// Override the API port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the genesis transactions file.
    #[arg(long)]
    genesis: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

fn init_tracing(config: &NodeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init {
        NodeConfig::default().save(&args.config)?;
        println!("wrote default config to {}", args.config.display());
        return Ok(());
    }

    let mut config = NodeConfig::load(&args.config)?;
    if let Some(port) = args.api_port {
        config.api.port = port;
    }
    if let Some(ref genesis) = args.genesis {
        config.ledger.genesis_txn = genesis.clone();
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    init_tracing(&config);

    tracing::info!("Indigo ledger node v{}", env!("CARGO_PKG_VERSION"));

    let genesis = load_genesis(&config.ledger.genesis_txn)
        .await
        .with_context(|| format!("loading {}", config.ledger.genesis_txn.display()))?;
    let ledger = Arc::new(InMemoryLedger::from_genesis(&genesis));
    let state = Arc::new(NodeState::new(ledger));
    let api_addr = config.api_addr()?;

    tokio::select! {
        result = api::start_api_server(api_addr, state) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP API server error");
                return Err(e);
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for ctrl-c")?;
            tracing::info!("received shutdown signal");
        }
    }

    tracing::info!("Indigo node exited cleanly");
    Ok(())
}
