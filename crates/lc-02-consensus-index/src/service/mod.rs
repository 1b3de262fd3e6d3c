//! Blockchain Service - block checking, application and fork switching
//!
//! # Pipeline
//!
//! ```text
//! check:  local index ─→ scope completion ─→ global rules
//! apply:  check ─→ generators ─→ applier ─→ trim
//! ```
//!
//! Calls are serialized through one async mutex: a single block is checked,
//! applied or reverted at a time.

use crate::applier::IndexApplier;
use crate::domain::{
    check_global_rules, local_index, ConsensusError, ConsensusResult, CurrencyParameters, Head,
};
use crate::generation::IndexGenerator;
use crate::ports::{BlockchainApi, IndexStore, SignatureVerifier, TransactionPool};
use crate::scope::{CompletedBlock, ScopeCompleter};
use crate::state::ChainState;
use async_trait::async_trait;
use lc_01_web_of_trust::TrustGraph;
use shared_types::Block;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Dependencies for BlockchainService
pub struct BlockchainDependencies<S, V, P> {
    pub store: Arc<S>,
    pub verifier: Arc<V>,
    pub pool: Arc<P>,
    pub params: CurrencyParameters,
}

/// Blockchain Service
pub struct BlockchainService<S, V, P>
where
    S: IndexStore,
    V: SignatureVerifier,
    P: TransactionPool,
{
    store: Arc<S>,
    verifier: Arc<V>,
    pool: Arc<P>,
    params: CurrencyParameters,
    state: ChainState,
    serial: Mutex<()>,
}

impl<S, V, P> BlockchainService<S, V, P>
where
    S: IndexStore,
    V: SignatureVerifier,
    P: TransactionPool,
{
    /// Create a service over an empty trust graph.
    pub fn new(deps: BlockchainDependencies<S, V, P>) -> ConsensusResult<Self> {
        let graph = TrustGraph::new(deps.params.sig_stock as usize);
        Self::with_trust_graph(deps, graph)
    }

    /// Create a service over a graph matching the store, e.g. after a quick sync.
    pub fn with_trust_graph(
        deps: BlockchainDependencies<S, V, P>,
        graph: TrustGraph,
    ) -> ConsensusResult<Self> {
        deps.params.validate()?;
        Ok(Self {
            store: deps.store,
            verifier: deps.verifier,
            pool: deps.pool,
            params: deps.params,
            state: ChainState::new(graph),
            serial: Mutex::new(()),
        })
    }

    pub fn params(&self) -> &CurrencyParameters {
        &self.params
    }

    /// Copy of the trust graph.
    pub fn trust_graph(&self) -> TrustGraph {
        self.state.graph.read().clone()
    }

    /// Reason of the failed revert that halted fork switching, if any.
    pub fn halted(&self) -> Option<String> {
        self.state.halted()
    }

    /// Error of the last trimming of the store, while no later trim succeeded.
    ///
    /// The block it followed stays applied; old rows and HEADs are simply
    /// kept until the next successful trim.
    pub fn trim_failure(&self) -> Option<String> {
        self.state.trim_failure()
    }

    /// Lift the halt after the operator repaired the store.
    pub fn resume(&self) {
        warn!("[lc-02] Fork switching resumed by operator");
        self.state.resume();
    }

    fn completer(&self) -> ScopeCompleter<'_, S, V> {
        ScopeCompleter::new(&*self.store, &*self.verifier, &self.state.graph, &self.params)
    }

    fn applier(&self) -> IndexApplier<'_, S, P> {
        IndexApplier::new(&*self.store, &*self.pool, &self.state.graph, &self.params)
    }

    // === CHECK & APPLY ===

    async fn check(&self, block: &Block) -> ConsensusResult<CompletedBlock> {
        let index = local_index(block, &self.params)?;
        let completed = self.completer().complete(block, index).await?;
        if let Err(rule) = check_global_rules(&completed.rule_context(block, &self.params)) {
            warn!(
                "[lc-02] Block #{} rejected by {}",
                block.number,
                rule.name()
            );
            return Err(rule.into());
        }
        debug!("[lc-02] Block #{} passes every global rule", block.number);
        Ok(completed)
    }

    async fn apply(&self, block: Block) -> ConsensusResult<Head> {
        let CompletedBlock {
            head, mut index, ..
        } = self.check(&block).await?;
        IndexGenerator::new(&*self.store, &self.params)
            .generate(&head, &mut index)
            .await?;

        let applier = self.applier();
        let head = applier
            .apply(block, head, index)
            .await
            .map_err(|err| match err {
                ConsensusError::RevertHalted(_) => self.halt(err),
                other => other,
            })?;
        match applier.trim(&head).await {
            Ok(()) => self.state.set_trim_failure(None),
            Err(err) => {
                error!("[lc-02] Trimming after block #{} failed: {}", head.number, err);
                self.state.set_trim_failure(Some(err.to_string()));
            }
        }
        Ok(head)
    }

    // === REVERT ===

    /// Revert the current block. Failures once the store was touched halt
    /// fork switching.
    async fn revert(&self) -> ConsensusResult<Block> {
        if let Some(reason) = self.state.halted() {
            return Err(ConsensusError::RevertHalted(reason));
        }
        match self.applier().revert().await {
            Ok(block) => Ok(block),
            Err(err @ (ConsensusError::EmptyChain | ConsensusError::NotCurrent(_))) => Err(err),
            Err(err) => Err(self.halt(err)),
        }
    }

    fn halt(&self, err: ConsensusError) -> ConsensusError {
        let reason = match err {
            ConsensusError::RevertHalted(reason) => reason,
            other => other.to_string(),
        };
        error!("[lc-02] Revert failed, fork switching halted: {}", reason);
        self.state.halt(reason.clone());
        ConsensusError::RevertHalted(reason)
    }

    /// Revert the blocks of a failed branch and re-apply the original ones.
    async fn restore(&self, applied: usize, originals: Vec<Block>) -> ConsensusResult<()> {
        for _ in 0..applied {
            self.revert().await?;
        }
        for block in originals.into_iter().rev() {
            let number = block.number;
            self.apply(block).await.map_err(|err| {
                self.halt(ConsensusError::RevertHalted(format!(
                    "original block #{} not restored: {}",
                    number, err
                )))
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl<S, V, P> BlockchainApi for BlockchainService<S, V, P>
where
    S: IndexStore + 'static,
    V: SignatureVerifier + 'static,
    P: TransactionPool + 'static,
{
    async fn check_block(&self, block: &Block) -> ConsensusResult<Head> {
        let _serial = self.serial.lock().await;
        Ok(self.check(block).await?.head)
    }

    async fn apply_block(&self, block: Block) -> ConsensusResult<Head> {
        let _serial = self.serial.lock().await;
        self.apply(block).await
    }

    async fn revert_current(&self) -> ConsensusResult<Block> {
        let _serial = self.serial.lock().await;
        self.revert().await
    }

    async fn switch_branch(&self, fork_point: u64, blocks: Vec<Block>) -> ConsensusResult<Head> {
        let _serial = self.serial.lock().await;
        if let Some(reason) = self.state.halted() {
            return Err(ConsensusError::RevertHalted(reason));
        }

        let current = self
            .store
            .current_block()
            .await?
            .ok_or(ConsensusError::EmptyChain)?
            .number;
        if fork_point > current {
            return Err(ConsensusError::InvalidForkPoint {
                fork_point,
                current,
            });
        }
        if current - fork_point > self.params.fork_window_size {
            return Err(ConsensusError::ForkTooOld {
                fork_point,
                window: self.params.fork_window_size,
            });
        }

        let mut originals = Vec::new();
        for _ in fork_point..current {
            originals.push(self.revert().await?);
        }

        let mut applied = 0;
        for block in blocks {
            let number = block.number;
            if let Err(err) = self.apply(block).await {
                warn!(
                    "[lc-02] Branch block #{} refused, restoring the original chain: {}",
                    number, err
                );
                self.restore(applied, originals).await?;
                return Err(err);
            }
            applied += 1;
        }

        let head = self
            .store
            .current_head()
            .await?
            .ok_or(ConsensusError::EmptyChain)?;
        info!(
            "[lc-02] Switched branch at #{}: {} blocks reverted, {} applied",
            fork_point,
            originals.len(),
            applied
        );
        Ok(head)
    }

    async fn current_head(&self) -> ConsensusResult<Option<Head>> {
        Ok(self.store.current_head().await?)
    }
}
