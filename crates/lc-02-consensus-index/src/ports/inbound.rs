//! Driving ports (Inbound API)

use crate::domain::{ConsensusResult, Head};
use async_trait::async_trait;
use shared_types::Block;

/// Primary consensus API of the node.
///
/// Calls are serialized: one block is checked or applied at a time.
#[async_trait]
pub trait BlockchainApi: Send + Sync {
    /// Run every global rule against `block` on top of the current chain.
    ///
    /// Nothing is written.
    async fn check_block(&self, block: &Block) -> ConsensusResult<Head>;

    /// Check `block`, then write it and its index. Returns the new HEAD.
    async fn apply_block(&self, block: Block) -> ConsensusResult<Head>;

    /// Undo the current block and keep it as a side block.
    async fn revert_current(&self) -> ConsensusResult<Block>;

    /// Replace the canonical blocks above `fork_point` with `blocks`.
    ///
    /// The original blocks are restored if the branch does not apply.
    async fn switch_branch(&self, fork_point: u64, blocks: Vec<Block>) -> ConsensusResult<Head>;

    async fn current_head(&self) -> ConsensusResult<Option<Head>>;
}
