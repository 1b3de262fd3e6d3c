//! # Shared Crypto - Document Signatures and Hashes
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `signatures` | Ed25519 | Identity, certification, revocation and transaction signatures |
//! | `hashing` | SHA-256 | Block/transaction hashes, `XHX` unlock preimages |
//!
//! ## Encodings
//!
//! - Public keys travel as base58 strings (32 bytes).
//! - Signatures travel as base64 strings (64 bytes).
//! - Hashes travel as uppercase hexadecimal.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod signatures;

// Re-exports
pub use errors::CryptoError;
pub use hashing::sha256_hex;
pub use signatures::{verify_base58, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
