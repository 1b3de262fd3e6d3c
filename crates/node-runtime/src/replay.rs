//! # Chain Replay
//!
//! Feeds a chain file to the consensus service, block by block, either with
//! every rule checked or through quick sync.

use crate::container::{create_dependencies, NodeConfig, NodeService};
use anyhow::{Context, Result};
use lc_02_consensus_index::{BlockchainService, Head, IndexStore, QuickSync};
use lc_02_consensus_index::ports::BlockchainApi;
use shared_types::Block;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Outcome of a replay.
#[derive(Debug, Clone)]
pub struct ReplaySummary {
    pub blocks: usize,
    pub head: Option<Head>,
    pub members: usize,
}

/// Read a JSON array of blocks.
pub fn load_chain(path: &Path) -> Result<Vec<Block>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read chain file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse chain file {}", path.display()))
}

/// Apply `blocks` on a fresh store and return the resulting service.
pub async fn replay(config: &NodeConfig, blocks: Vec<Block>) -> Result<(NodeService, ReplaySummary)> {
    let deps = create_dependencies(config);
    let store = Arc::clone(&deps.store);
    let count = blocks.len();
    let started = Instant::now();

    let service = if config.quick_sync {
        QuickSync::new(deps)
            .sync(blocks)
            .await
            .context("Quick sync failed")?
    } else {
        let service = BlockchainService::new(deps).context("Invalid currency parameters")?;
        for block in blocks {
            let number = block.number;
            service
                .apply_block(block)
                .await
                .with_context(|| format!("Block #{} refused", number))?;
        }
        service
    };

    let summary = ReplaySummary {
        blocks: count,
        head: service.current_head().await?,
        members: store.members().await?.len(),
    };
    info!(
        "Replayed {} blocks in {:?} ({} members)",
        summary.blocks,
        started.elapsed(),
        summary.members
    );
    Ok((service, summary))
}
