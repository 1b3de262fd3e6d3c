//! # SHA-256 Hashing
//!
//! Every protocol hash is SHA-256 rendered as uppercase hexadecimal.

use sha2::{Digest, Sha256};

/// Hash data with SHA-256 and render it as uppercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(data))
}
