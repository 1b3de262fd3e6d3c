//! # Shared Types Crate
//!
//! Wire-level documents consumed by every subsystem of the node.
//!
//! ## Contents
//!
//! - **Blockstamp**: the `number-HASH` pair identifying one block.
//! - **Entities**: [`Block`] and [`Transaction`] as received from the network.
//! - **Inline records**: positional, colon-delimited encodings of identities,
//!   memberships, certifications, revocations and transaction inputs/outputs.
//! - **Documents**: canonical raw texts that issuers sign (identity,
//!   certification, revocation, transaction).
//!
//! ## Design Principles
//!
//! - Parsing is the only place where structural errors surface. Everything
//!   downstream works on typed records.
//! - Field order inside inline records is part of the wire format and is never
//!   reordered.

pub mod blockstamp;
pub mod constants;
pub mod documents;
pub mod entities;
pub mod errors;
pub mod inline;

pub use blockstamp::Blockstamp;
pub use entities::*;
pub use errors::*;
pub use inline::*;
