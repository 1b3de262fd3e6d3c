//! # Node Container
//!
//! Configuration and wiring of the consensus service with its in-memory
//! adapters.

pub mod config;

pub use config::{ConfigError, NodeConfig};

use lc_02_consensus_index::{
    BlockchainDependencies, BlockchainService, Ed25519Verifier, InMemoryIndexStore,
    InMemoryTransactionPool,
};
use std::sync::Arc;

pub type NodeService =
    BlockchainService<InMemoryIndexStore, Ed25519Verifier, InMemoryTransactionPool>;

pub type NodeDependencies =
    BlockchainDependencies<InMemoryIndexStore, Ed25519Verifier, InMemoryTransactionPool>;

/// Fresh dependencies over an empty store.
pub fn create_dependencies(config: &NodeConfig) -> NodeDependencies {
    BlockchainDependencies {
        store: Arc::new(InMemoryIndexStore::new()),
        verifier: Arc::new(Ed25519Verifier),
        pool: Arc::new(InMemoryTransactionPool::new()),
        params: config.currency.clone(),
    }
}
