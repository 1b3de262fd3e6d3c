//! Adapters layer (Hexagonal Architecture)

mod ed25519_verifier;
mod memory_store;
mod tx_pool;

pub use ed25519_verifier::*;
pub use memory_store::*;
pub use tx_pool::*;
