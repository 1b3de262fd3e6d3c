//! # Currency Node Runtime
//!
//! Replays a chain file through the consensus index and reports the
//! resulting HEAD.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (environment, currency file)
//! 2. Initialize logging from `LC_LOG_LEVEL`
//! 3. Load the chain file
//! 4. Replay it, fully checked or through quick sync
//! 5. Report the HEAD

use anyhow::{Context, Result};
use node_runtime::{load_chain, replay, NodeConfig};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::from_env().context("Failed to load configuration")?;
    init_logging(&config.log_level)?;

    info!("===========================================");
    info!("  Currency node runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("  Currency: {}", config.currency.currency);
    info!("  Mode: {}", if config.quick_sync { "quick sync" } else { "full check" });
    info!("===========================================");

    let Some(chain_file) = config.chain_file.clone() else {
        warn!("No chain file given, set LC_CHAIN_FILE");
        return Ok(());
    };
    let blocks = load_chain(&chain_file)?;
    let (service, summary) = replay(&config, blocks).await?;

    match &summary.head {
        Some(head) => info!(
            "HEAD #{} {} | members {} | mass {} | dividend {}",
            head.number,
            head.hash,
            head.members_count,
            head.mass,
            head.dividend
        ),
        None => info!("Chain is empty"),
    }
    if let Some(reason) = service.halted() {
        warn!("Fork switching halted: {}", reason);
    }
    Ok(())
}
