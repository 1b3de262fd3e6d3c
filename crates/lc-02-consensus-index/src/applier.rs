//! # Index Applier
//!
//! State transition of one block and its exact inverse.
//!
//! ```text
//! apply:   wotb ids → write index → graph → wallets → HEAD → block
//! revert:  remove index → graph (inverse, reversed) → wallets → HEAD → side block
//! ```
//!
//! The index is written first, in one batch per index. When a later step
//! fails, everything already done is undone before the error is returned.
//! A failure while undoing is reported as [`ConsensusError::RevertHalted`].

use crate::domain::{
    balance_variations, BlockIndex, ConsensusError, ConsensusResult, CurrencyParameters, Head,
    Op, StoreResult, Wallet,
};
use crate::ports::{IndexStore, TransactionPool};
use lc_01_web_of_trust::{TrustGraph, WotError, WotId};
use parking_lot::RwLock;
use shared_types::{Block, Blockstamp};
use tracing::{debug, error, info, warn};

/// One mutation of the trust graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphOp {
    AddNode(WotId),
    RemoveNode(WotId),
    SetEnabled(WotId, bool),
    AddLink(WotId, WotId),
    RemoveLink(WotId, WotId),
}

impl GraphOp {
    pub fn inverse(self) -> GraphOp {
        match self {
            GraphOp::AddNode(id) => GraphOp::RemoveNode(id),
            GraphOp::RemoveNode(id) => GraphOp::AddNode(id),
            GraphOp::SetEnabled(id, enabled) => GraphOp::SetEnabled(id, !enabled),
            GraphOp::AddLink(issuer, receiver) => GraphOp::RemoveLink(issuer, receiver),
            GraphOp::RemoveLink(issuer, receiver) => GraphOp::AddLink(issuer, receiver),
        }
    }

    /// Apply to `graph`.
    ///
    /// A link beyond the issuer's stock, or the removal of a missing link,
    /// leaves the graph unchanged.
    pub fn run(self, graph: &mut TrustGraph) -> Result<(), WotError> {
        match self {
            GraphOp::AddNode(expected) => {
                let id = graph.add_node();
                if id != expected {
                    warn!("[lc-02] wotb id {} assigned, {} expected", id, expected);
                }
            }
            GraphOp::RemoveNode(expected) => {
                let id = graph.remove_node()?;
                if id != expected {
                    warn!("[lc-02] wotb id {} removed, {} expected", id, expected);
                }
            }
            GraphOp::SetEnabled(id, enabled) => graph.set_enabled(id, enabled)?,
            GraphOp::AddLink(issuer, receiver) => match graph.add_link(issuer, receiver) {
                Err(WotError::AllCertificationsUsed { .. }) => {
                    debug!("[lc-02] link {} -> {} over stock, skipped", issuer, receiver)
                }
                other => {
                    other?;
                }
            },
            GraphOp::RemoveLink(issuer, receiver) => match graph.remove_link(issuer, receiver) {
                Err(WotError::UnknownLink { .. }) => {}
                other => {
                    other?;
                }
            },
        }
        Ok(())
    }

    /// Undo this operation on `graph`, which must be in the state it left.
    ///
    /// A link missing on undo is only accepted when its issuer is at full
    /// stock, where the addition may have been skipped. A node removal must
    /// remove the node this operation added.
    pub fn undo(self, graph: &mut TrustGraph) -> Result<(), WotError> {
        match self {
            GraphOp::AddLink(issuer, receiver) => match graph.remove_link(issuer, receiver) {
                Err(WotError::UnknownLink { .. })
                    if graph.issued_count(issuer) >= Some(graph.max_links()) =>
                {
                    Ok(())
                }
                other => other.map(|_| ()),
            },
            GraphOp::AddNode(expected) => {
                if graph.size() != expected.0 + 1 {
                    return Err(WotError::UnknownNode(expected));
                }
                graph.remove_node().map(|_| ())
            }
            op => op.inverse().run(graph),
        }
    }
}

/// What a partially applied block already changed.
#[derive(Debug, Default)]
struct Applied {
    graph: Vec<GraphOp>,
    /// Wallets as they were before the block.
    wallets: Vec<Wallet>,
    head: bool,
}

/// Writes and reverts blocks against a store, a trust graph and a pool.
pub struct IndexApplier<'a, S: ?Sized, P: ?Sized> {
    store: &'a S,
    pool: &'a P,
    graph: &'a RwLock<TrustGraph>,
    params: &'a CurrencyParameters,
}

impl<'a, S, P> IndexApplier<'a, S, P>
where
    S: IndexStore + ?Sized,
    P: TransactionPool + ?Sized,
{
    pub fn new(
        store: &'a S,
        pool: &'a P,
        graph: &'a RwLock<TrustGraph>,
        params: &'a CurrencyParameters,
    ) -> Self {
        Self {
            store,
            pool,
            graph,
            params,
        }
    }

    // === APPLY ===

    /// Write `block` with its complete index and make `head` current.
    pub async fn apply(
        &self,
        block: Block,
        head: Head,
        mut index: BlockIndex,
    ) -> ConsensusResult<Head> {
        self.prepare(&mut index);
        self.store.write_index(&index).await?;

        let stamp = block.blockstamp();
        let mut applied = Applied::default();
        if let Err(err) = self
            .finish_apply(&block, &head, &index, &mut applied)
            .await
        {
            warn!(
                "[lc-02] Block #{} could not be applied, undoing: {}",
                block.number, err
            );
            self.undo_partial(&stamp, applied).await.map_err(|undo| {
                error!("[lc-02] Undo of block {} failed: {}", stamp, undo);
                ConsensusError::RevertHalted(undo.to_string())
            })?;
            return Err(err);
        }

        let included: Vec<String> = block.transactions.iter().map(|tx| tx.hash()).collect();
        if !included.is_empty() {
            if let Err(reason) = self.pool.remove_included(included).await {
                warn!("[lc-02] Pool cleanup after block #{} failed: {}", block.number, reason);
            }
        }

        info!(
            "[lc-02] Block #{} applied: {} index entries, {} members",
            head.number,
            index.len(),
            head.members_count
        );
        Ok(head)
    }

    /// Reserve graph ids for the newcomers, in declaration order, and drop
    /// the facts only the rules read.
    fn prepare(&self, index: &mut BlockIndex) {
        let next = self.graph.read().size();
        for (i, entry) in index
            .iindex
            .iter_mut()
            .filter(|e| e.op == Op::Create)
            .enumerate()
        {
            entry.wotb_id = Some(WotId(next + i));
        }
        index.iindex.iter_mut().for_each(|e| e.facts = Default::default());
        index.mindex.iter_mut().for_each(|e| e.facts = Default::default());
        index.cindex.iter_mut().for_each(|e| e.facts = Default::default());
        index.sindex.iter_mut().for_each(|e| e.facts = Default::default());
    }

    async fn finish_apply(
        &self,
        block: &Block,
        head: &Head,
        index: &BlockIndex,
        applied: &mut Applied,
    ) -> ConsensusResult<()> {
        let ops = self.graph_ops(index).await?;
        {
            let mut graph = self.graph.write();
            for op in ops {
                op.run(&mut graph)?;
                applied.graph.push(op);
            }
        }

        for (conditions, delta) in balance_variations(&index.sindex) {
            let previous = self
                .store
                .wallet(&conditions)
                .await?
                .unwrap_or_else(|| Wallet::new(conditions.clone()));
            let updated = Wallet {
                balance: previous.balance + delta,
                ..previous.clone()
            };
            self.store.save_wallet(updated).await?;
            applied.wallets.push(previous);
        }

        self.store.push_head(head.clone()).await?;
        applied.head = true;
        self.store.save_block(block.clone()).await?;
        Ok(())
    }

    async fn undo_partial(&self, stamp: &Blockstamp, applied: Applied) -> ConsensusResult<()> {
        if applied.head {
            self.store.pop_head().await?;
        }
        for wallet in applied.wallets.into_iter().rev() {
            self.store.save_wallet(wallet).await?;
        }
        self.run_inverse(&applied.graph)?;
        self.store.remove_entries_written_on(stamp).await?;
        Ok(())
    }

    /// Fold old index rows and drop HEADs beyond the bindex size.
    pub async fn trim(&self, head: &Head) -> ConsensusResult<()> {
        let keep = self
            .params
            .bindex_size(head.issuers_count, head.issuers_frame);
        self.store.trim_heads(keep as usize).await?;
        if head.number > keep {
            self.store.trim_indexes(head.number - keep).await?;
        }
        Ok(())
    }

    // === REVERT ===

    /// Undo the current block and keep it as a side block.
    pub async fn revert(&self) -> ConsensusResult<Block> {
        let block = self
            .store
            .current_block()
            .await?
            .ok_or(ConsensusError::EmptyChain)?;
        let stamp = block.blockstamp();
        let head = self.store.current_head().await?;
        if head.as_ref().map(Head::blockstamp) != Some(stamp.clone()) {
            return Err(ConsensusError::NotCurrent(stamp));
        }

        let removed = self.store.remove_entries_written_on(&stamp).await?;
        let ops = self.graph_ops(&removed).await?;
        self.run_inverse(&ops).map_err(|err| {
            error!("[lc-02] Trust graph of block {} not restored: {}", stamp, err);
            ConsensusError::RevertHalted(format!("trust graph of block {stamp} not restored: {err}"))
        })?;

        for (conditions, delta) in balance_variations(&removed.sindex) {
            let mut wallet = self
                .store
                .wallet(&conditions)
                .await?
                .unwrap_or_else(|| Wallet::new(conditions.clone()));
            wallet.balance -= delta;
            self.store.save_wallet(wallet).await?;
        }

        self.store.pop_head().await?;
        self.store.pop_block().await?;
        self.store.save_side_block(block.clone()).await?;

        if !block.transactions.is_empty() {
            if let Err(reason) = self.pool.readmit(block.transactions.clone()).await {
                warn!("[lc-02] Transactions of block {} not readmitted: {}", stamp, reason);
            }
        }

        info!("[lc-02] Block {} reverted", stamp);
        Ok(block)
    }

    // === TRUST GRAPH ===

    /// Graph mutations carried by an index, in application order.
    pub async fn graph_ops(&self, index: &BlockIndex) -> StoreResult<Vec<GraphOp>> {
        let mut ops: Vec<GraphOp> = index
            .newcomers()
            .filter_map(|e| e.wotb_id)
            .map(GraphOp::AddNode)
            .collect();

        for entry in index.iindex.iter().filter(|e| e.op == Op::Update) {
            let Some(member) = entry.member else {
                continue;
            };
            if let Some(id) = self.wotb_id(index, &entry.pubkey).await? {
                ops.push(GraphOp::SetEnabled(id, member));
            }
        }

        for cert in &index.cindex {
            let issuer = self.wotb_id(index, &cert.issuer).await?;
            let receiver = self.wotb_id(index, &cert.receiver).await?;
            let (Some(issuer), Some(receiver)) = (issuer, receiver) else {
                continue;
            };
            match cert.op {
                Op::Create => ops.push(GraphOp::AddLink(issuer, receiver)),
                Op::Update if cert.expired_on.is_some_and(|t| t > 0) => {
                    ops.push(GraphOp::RemoveLink(issuer, receiver))
                }
                Op::Update => {}
            }
        }
        Ok(ops)
    }

    async fn wotb_id(&self, index: &BlockIndex, pubkey: &str) -> StoreResult<Option<WotId>> {
        let local = index
            .newcomers()
            .find(|e| e.pubkey == pubkey)
            .and_then(|e| e.wotb_id);
        if local.is_some() {
            return Ok(local);
        }
        Ok(self
            .store
            .iindex_reduced(pubkey)
            .await?
            .and_then(|e| e.wotb_id))
    }

    /// Undo `ops` newest first. Stops at the first operation that cannot be undone.
    fn run_inverse(&self, ops: &[GraphOp]) -> Result<(), WotError> {
        let mut graph = self.graph.write();
        for op in ops.iter().rev() {
            op.undo(&mut graph).map_err(|err| {
                error!("[lc-02] Trust graph restore failed on {:?}: {}", op, err);
                err
            })?;
        }
        Ok(())
    }
}
