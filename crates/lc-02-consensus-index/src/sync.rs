//! # Quick Sync
//!
//! Replays a trusted chain without the global rules. Blocks go through the
//! same HEAD derivation, generators and applier as live blocks, on top of a
//! [`BufferedStore`] that keeps recent HEADs, wallets and index rows in
//! memory and writes them to the real store in batches.
//!
//! ```text
//! blocks ≤ last - forkWindow:  local index ─→ HEAD ─→ generators ─→ apply (buffered)
//! last forkWindow blocks:      BlockchainService::apply_block (every rule checked)
//! ```

use crate::applier::IndexApplier;
use crate::domain::{
    local_index, BlockIndex, CertificationEntry, ConsensusResult, CurrencyParameters, Head,
    IdentityEntry, MembershipEntry, Op, SourceEntry, StoreResult, Wallet,
};
use crate::generation::IndexGenerator;
use crate::ports::{BlockchainApi, IndexStore, SignatureVerifier, TransactionPool};
use crate::scope::stored_head;
use crate::service::{BlockchainDependencies, BlockchainService};
use async_trait::async_trait;
use lc_01_web_of_trust::TrustGraph;
use parking_lot::RwLock;
use shared_types::{Block, Blockstamp};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Buffered index rows written in one batch once exceeded.
pub const DEFAULT_BUFFER_LIMIT: usize = 10_000;

#[derive(Debug, Default)]
struct Buffer {
    /// Oldest first.
    heads: Vec<Head>,
    pending: BlockIndex,
    wallets: HashMap<String, Wallet>,
}

/// Write-behind view of an [`IndexStore`].
///
/// Reads merge the buffered rows after the stored ones, so every query sees
/// the same chronological history as the inner store would.
pub struct BufferedStore<S> {
    inner: Arc<S>,
    buffer: RwLock<Buffer>,
    /// Number of the inner store's HEAD when the buffer was loaded.
    loaded_at: Option<u64>,
}

impl<S: IndexStore> BufferedStore<S> {
    /// Load the recent HEAD window of `inner`.
    pub async fn load(inner: Arc<S>, params: &CurrencyParameters) -> StoreResult<Self> {
        let current = inner.current_head().await?;
        let mut heads = match &current {
            None => Vec::new(),
            Some(h) => {
                let window = 2 * params.bindex_size(h.issuers_count, h.issuers_frame);
                inner.heads(window as usize).await?
            }
        };
        heads.reverse();
        Ok(Self {
            inner,
            buffer: RwLock::new(Buffer {
                heads,
                ..Buffer::default()
            }),
            loaded_at: current.map(|h| h.number),
        })
    }

    /// Buffered index rows.
    pub fn pending_len(&self) -> usize {
        self.buffer.read().pending.len()
    }

    /// Drop the oldest `keep` HEADs once the window holds twice that many.
    /// Returns the number of the oldest HEAD kept when trimmed.
    pub fn roll_heads(&self, keep: usize) -> Option<u64> {
        let mut buffer = self.buffer.write();
        if keep == 0 || buffer.heads.len() < 2 * keep {
            return None;
        }
        buffer.heads.drain(..keep);
        buffer.heads.first().map(|h| h.number)
    }

    /// Write the buffered index rows to the inner store.
    pub async fn flush(&self) -> StoreResult<()> {
        let pending = std::mem::take(&mut self.buffer.write().pending);
        if pending.is_empty() {
            return Ok(());
        }
        debug!("[lc-02] Flushing {} buffered index rows", pending.len());
        if let Err(err) = self.inner.write_index(&pending).await {
            let mut buffer = self.buffer.write();
            let newer = std::mem::replace(&mut buffer.pending, pending);
            buffer.pending.extend(newer);
            return Err(err);
        }
        Ok(())
    }

    /// Flush everything: index rows, wallets and the HEADs newer than the
    /// ones the inner store had when loaded.
    pub async fn finish(&self) -> StoreResult<()> {
        self.flush().await?;

        let (wallets, heads) = {
            let buffer = self.buffer.read();
            let mut wallets: Vec<Wallet> = buffer.wallets.values().cloned().collect();
            wallets.sort_by(|a, b| a.conditions.cmp(&b.conditions));
            let heads: Vec<Head> = buffer
                .heads
                .iter()
                .filter(|h| self.loaded_at.map_or(true, |n| h.number > n))
                .cloned()
                .collect();
            (wallets, heads)
        };
        for wallet in wallets {
            self.inner.save_wallet(wallet).await?;
        }
        for head in heads {
            self.inner.push_head(head).await?;
        }
        Ok(())
    }

    fn pending<R>(&self, read: impl FnOnce(&BlockIndex) -> R) -> R {
        read(&self.buffer.read().pending)
    }
}

fn merge_keys(mut keys: Vec<String>, buffered: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: HashSet<String> = keys.iter().cloned().collect();
    keys.extend(buffered.filter(|k| seen.insert(k.clone())));
    keys
}

fn take_written_on<T>(rows: &mut Vec<T>, stamp: &Blockstamp, written_on: impl Fn(&T) -> &Blockstamp) -> Vec<T> {
    let (removed, kept): (Vec<T>, Vec<T>) = rows.drain(..).partition(|r| written_on(r) == stamp);
    *rows = kept;
    removed
}

#[async_trait]
impl<S: IndexStore> IndexStore for BufferedStore<S> {
    async fn current_block(&self) -> StoreResult<Option<Block>> {
        self.inner.current_block().await
    }

    async fn block(&self, number: u64) -> StoreResult<Option<Block>> {
        self.inner.block(number).await
    }

    async fn save_block(&self, block: Block) -> StoreResult<()> {
        self.inner.save_block(block).await
    }

    async fn pop_block(&self) -> StoreResult<Option<Block>> {
        self.inner.pop_block().await
    }

    async fn save_side_block(&self, block: Block) -> StoreResult<()> {
        self.inner.save_side_block(block).await
    }

    async fn heads(&self, count: usize) -> StoreResult<Vec<Head>> {
        Ok(self
            .buffer
            .read()
            .heads
            .iter()
            .rev()
            .take(count)
            .cloned()
            .collect())
    }

    async fn push_head(&self, head: Head) -> StoreResult<()> {
        self.buffer.write().heads.push(head);
        Ok(())
    }

    async fn pop_head(&self) -> StoreResult<Option<Head>> {
        Ok(self.buffer.write().heads.pop())
    }

    async fn trim_heads(&self, keep: usize) -> StoreResult<()> {
        let mut buffer = self.buffer.write();
        let excess = buffer.heads.len().saturating_sub(keep);
        buffer.heads.drain(..excess);
        Ok(())
    }

    async fn iindex_rows(&self, pubkey: &str) -> StoreResult<Vec<IdentityEntry>> {
        let mut rows = self.inner.iindex_rows(pubkey).await?;
        rows.extend(self.pending(|p| {
            p.iindex
                .iter()
                .filter(|e| e.pubkey == pubkey)
                .cloned()
                .collect::<Vec<_>>()
        }));
        Ok(rows)
    }

    async fn iindex_rows_by_uid(&self, uid: &str) -> StoreResult<Vec<IdentityEntry>> {
        let mut rows = self.inner.iindex_rows_by_uid(uid).await?;
        rows.extend(self.pending(|p| {
            p.iindex
                .iter()
                .filter(|e| e.uid.as_deref() == Some(uid))
                .cloned()
                .collect::<Vec<_>>()
        }));
        Ok(rows)
    }

    async fn iindex_pubkeys(&self) -> StoreResult<Vec<String>> {
        let keys = self.inner.iindex_pubkeys().await?;
        let buffered: Vec<String> = self.pending(|p| p.iindex.iter().map(|e| e.pubkey.clone()).collect());
        Ok(merge_keys(keys, buffered.into_iter()))
    }

    async fn mindex_rows(&self, pubkey: &str) -> StoreResult<Vec<MembershipEntry>> {
        let mut rows = self.inner.mindex_rows(pubkey).await?;
        rows.extend(self.pending(|p| {
            p.mindex
                .iter()
                .filter(|e| e.pubkey == pubkey)
                .cloned()
                .collect::<Vec<_>>()
        }));
        Ok(rows)
    }

    async fn mindex_pubkeys(&self) -> StoreResult<Vec<String>> {
        let keys = self.inner.mindex_pubkeys().await?;
        let buffered: Vec<String> = self.pending(|p| p.mindex.iter().map(|e| e.pubkey.clone()).collect());
        Ok(merge_keys(keys, buffered.into_iter()))
    }

    async fn cindex_rows_from(&self, issuer: &str) -> StoreResult<Vec<CertificationEntry>> {
        let mut rows = self.inner.cindex_rows_from(issuer).await?;
        rows.extend(self.pending(|p| {
            p.cindex
                .iter()
                .filter(|e| e.issuer == issuer)
                .cloned()
                .collect::<Vec<_>>()
        }));
        Ok(rows)
    }

    async fn cindex_rows_to(&self, receiver: &str) -> StoreResult<Vec<CertificationEntry>> {
        let mut rows = self.inner.cindex_rows_to(receiver).await?;
        rows.extend(self.pending(|p| {
            p.cindex
                .iter()
                .filter(|e| e.receiver == receiver)
                .cloned()
                .collect::<Vec<_>>()
        }));
        Ok(rows)
    }

    async fn cindex_issuers(&self) -> StoreResult<Vec<String>> {
        let keys = self.inner.cindex_issuers().await?;
        let buffered: Vec<String> = self.pending(|p| p.cindex.iter().map(|e| e.issuer.clone()).collect());
        Ok(merge_keys(keys, buffered.into_iter()))
    }

    async fn sindex_rows(&self, identifier: &str, pos: u64) -> StoreResult<Vec<SourceEntry>> {
        let mut rows = self.inner.sindex_rows(identifier, pos).await?;
        rows.extend(self.pending(|p| {
            p.sindex
                .iter()
                .filter(|e| e.identifier == identifier && e.pos == pos)
                .cloned()
                .collect::<Vec<_>>()
        }));
        Ok(rows)
    }

    async fn sindex_rows_by_conditions(&self, conditions: &str) -> StoreResult<Vec<SourceEntry>> {
        let mut rows = self.inner.sindex_rows_by_conditions(conditions).await?;
        rows.extend(self.pending(|p| {
            p.sindex
                .iter()
                .filter(|e| e.conditions.as_deref() == Some(conditions))
                .cloned()
                .collect::<Vec<_>>()
        }));
        Ok(rows)
    }

    async fn write_index(&self, index: &BlockIndex) -> StoreResult<()> {
        self.buffer.write().pending.extend(index.clone());
        Ok(())
    }

    async fn remove_entries_written_on(&self, stamp: &Blockstamp) -> StoreResult<BlockIndex> {
        let buffered = {
            let mut buffer = self.buffer.write();
            let pending = &mut buffer.pending;
            BlockIndex {
                iindex: take_written_on(&mut pending.iindex, stamp, |e| &e.written_on),
                mindex: take_written_on(&mut pending.mindex, stamp, |e| &e.written_on),
                cindex: take_written_on(&mut pending.cindex, stamp, |e| &e.written_on),
                sindex: take_written_on(&mut pending.sindex, stamp, |e| &e.written_on),
            }
        };
        let mut removed = self.inner.remove_entries_written_on(stamp).await?;
        removed.extend(buffered);
        Ok(removed)
    }

    async fn trim_indexes(&self, below: u64) -> StoreResult<()> {
        self.flush().await?;
        self.inner.trim_indexes(below).await
    }

    async fn wallet(&self, conditions: &str) -> StoreResult<Option<Wallet>> {
        if let Some(wallet) = self.buffer.read().wallets.get(conditions) {
            return Ok(Some(wallet.clone()));
        }
        self.inner.wallet(conditions).await
    }

    async fn save_wallet(&self, wallet: Wallet) -> StoreResult<()> {
        self.buffer
            .write()
            .wallets
            .insert(wallet.conditions.clone(), wallet);
        Ok(())
    }
}

/// Set the spending condition of every consumed source from the source it
/// spends: a written one, or an output of an earlier transaction of the block.
pub async fn fill_input_conditions<S: IndexStore + ?Sized>(
    store: &S,
    sindex: &mut [SourceEntry],
) -> StoreResult<()> {
    let outputs: Vec<SourceEntry> = sindex
        .iter()
        .filter(|e| e.op == Op::Create)
        .cloned()
        .collect();
    for input in sindex
        .iter_mut()
        .filter(|e| e.op == Op::Update && e.conditions.is_none())
    {
        input.conditions = match store.source(&input.identifier, input.pos).await? {
            Some(source) => source.conditions,
            None => outputs
                .iter()
                .find(|o| o.same_source(input))
                .and_then(|o| o.conditions.clone()),
        };
    }
    Ok(())
}

fn wot_rows(index: &BlockIndex) -> usize {
    index.iindex.len() + index.mindex.len() + index.cindex.len()
}

fn carries_wot_documents(block: &Block) -> bool {
    !(block.identities.is_empty()
        && block.joiners.is_empty()
        && block.actives.is_empty()
        && block.leavers.is_empty()
        && block.revoked.is_empty()
        && block.excluded.is_empty()
        && block.certifications.is_empty())
}

/// Replays a trusted chain, then hands over to a [`BlockchainService`].
pub struct QuickSync<S, V, P> {
    deps: BlockchainDependencies<S, V, P>,
    graph: TrustGraph,
    buffer_limit: usize,
}

impl<S, V, P> QuickSync<S, V, P>
where
    S: IndexStore + 'static,
    V: SignatureVerifier + 'static,
    P: TransactionPool + 'static,
{
    /// Sync from the store's current state, which must match an empty graph.
    pub fn new(deps: BlockchainDependencies<S, V, P>) -> Self {
        let graph = TrustGraph::new(deps.params.sig_stock as usize);
        Self {
            deps,
            graph,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
        }
    }

    pub fn with_trust_graph(mut self, graph: TrustGraph) -> Self {
        self.graph = graph;
        self
    }

    pub fn with_buffer_limit(mut self, limit: usize) -> Self {
        self.buffer_limit = limit;
        self
    }

    /// Apply `blocks` in order. All but the last `forkWindowSize` ones are
    /// trusted; those are checked through the returned service.
    pub async fn sync(self, blocks: Vec<Block>) -> ConsensusResult<BlockchainService<S, V, P>> {
        let QuickSync {
            deps,
            graph,
            buffer_limit,
        } = self;
        deps.params.validate()?;

        let last = blocks.last().map_or(0, |b| b.number);
        let (trusted, checked): (Vec<Block>, Vec<Block>) = blocks
            .into_iter()
            .partition(|b| b.number + deps.params.fork_window_size <= last);

        let store = BufferedStore::load(deps.store.clone(), &deps.params).await?;
        let graph = RwLock::new(graph);
        let replay = Replay {
            store: &store,
            pool: &*deps.pool,
            graph: &graph,
            params: &deps.params,
            buffer_limit,
        };
        let count = trusted.len();
        let mut head = None;
        for block in trusted {
            head = Some(replay.apply(block).await?);
        }
        store.finish().await?;
        if let Some(head) = &head {
            let keep = deps.params.bindex_size(head.issuers_count, head.issuers_frame);
            deps.store.trim_heads(keep as usize).await?;
            if head.number > keep {
                deps.store.trim_indexes(head.number - keep).await?;
            }
            info!(
                "[lc-02] Quick sync replayed {} blocks up to #{}",
                count, head.number
            );
        }

        let service = BlockchainService::with_trust_graph(deps, graph.into_inner())?;
        for block in checked {
            service.apply_block(block).await?;
        }
        Ok(service)
    }
}

struct Replay<'a, S, P: ?Sized> {
    store: &'a BufferedStore<S>,
    pool: &'a P,
    graph: &'a RwLock<TrustGraph>,
    params: &'a CurrencyParameters,
    buffer_limit: usize,
}

impl<S, P> Replay<'_, S, P>
where
    S: IndexStore,
    P: TransactionPool + ?Sized,
{
    async fn apply(&self, block: Block) -> ConsensusResult<Head> {
        let mut index = local_index(&block, self.params)?;
        fill_input_conditions(self.store, &mut index.sindex).await?;
        let (head, _) = stored_head(self.store, &block, &index, self.params).await?;

        let local_wot_rows = wot_rows(&index);
        IndexGenerator::new(self.store, self.params)
            .generate(&head, &mut index)
            .await?;
        let wot_effects = carries_wot_documents(&block) || wot_rows(&index) > local_wot_rows;

        let head = IndexApplier::new(self.store, self.pool, self.graph, self.params)
            .apply(block, head, index)
            .await?;

        if wot_effects || self.store.pending_len() >= self.buffer_limit {
            self.store.flush().await?;
        }
        let keep = self.params.bindex_size(head.issuers_count, head.issuers_frame);
        if let Some(oldest) = self.store.roll_heads(keep as usize) {
            self.store.trim_indexes(oldest).await?;
        }
        Ok(head)
    }
}
