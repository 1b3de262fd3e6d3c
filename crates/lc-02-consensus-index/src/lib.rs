//! # lc-02-consensus-index
//!
//! Consensus rule engine and index state machine of the currency.
//!
//! ## Architecture
//!
//! Every block is turned into index entries (identities, memberships,
//! certifications, money sources). The global rules only read those entries
//! once their derived facts are attached; the state transition only writes
//! them.
//!
//! ```text
//!  Block ──→ local_index ──→ ScopeCompleter ──→ check_global_rules
//!                               │  HEAD + facts       │ first failing rule
//!                               ↓                     ↓
//!                          IndexStore            Rule::name()
//!                               ↑
//!  IndexGenerator (G91-G106) ───┤
//!                               │
//!  IndexApplier ── write / revert ──→ IndexStore + TrustGraph + wallets
//! ```
//!
//! ### Ports
//!
//! - [`IndexStore`]: blocks, HEAD history, the four indexes and wallets.
//! - [`SignatureVerifier`]: document signatures (Ed25519 in production).
//! - [`TransactionPool`]: pending transactions, cleaned on apply and
//!   refilled on revert.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lc_02_consensus_index::{BlockchainDependencies, BlockchainService, CurrencyParameters};
//! use lc_02_consensus_index::adapters::{Ed25519Verifier, InMemoryIndexStore, InMemoryTransactionPool};
//! use lc_02_consensus_index::ports::BlockchainApi;
//!
//! let service = BlockchainService::new(BlockchainDependencies {
//!     store: Arc::new(InMemoryIndexStore::new()),
//!     verifier: Arc::new(Ed25519Verifier),
//!     pool: Arc::new(InMemoryTransactionPool::new()),
//!     params: CurrencyParameters::default(),
//! })?;
//!
//! let head = service.apply_block(block).await?;
//! ```
//!
//! ## Quick Sync
//!
//! [`QuickSync`] replays a trusted chain through the same derivation and
//! applier, skipping the rules for every block outside the fork window.

pub mod adapters;
pub mod applier;
pub mod domain;
pub mod generation;
pub mod ports;
pub mod scope;
pub mod service;
pub mod state;
pub mod sync;

// Re-export main types
pub use adapters::{Ed25519Verifier, InMemoryIndexStore, InMemoryTransactionPool};
pub use applier::{GraphOp, IndexApplier};
pub use domain::{
    check_global_rules, derive_head, local_index, reduce, BlockIndex, CertificationEntry,
    ConsensusError, ConsensusResult, CurrencyParameters, Head, IdentityEntry, IndexEntry,
    MembershipEntry, Op, Rule, SourceEntry, StoreError, StoreResult, Wallet,
};
pub use generation::IndexGenerator;
pub use ports::{BlockchainApi, IndexStore, SignatureVerifier, TransactionPool};
pub use scope::{stored_head, CompletedBlock, ScopeCompleter};
pub use service::{BlockchainDependencies, BlockchainService};
pub use sync::{BufferedStore, QuickSync};
