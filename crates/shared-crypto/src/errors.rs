//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Invalid signature format
    #[error("Invalid signature format")]
    InvalidSignatureFormat,

    /// Invalid public key
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Text encoding could not be decoded
    #[error("Invalid {encoding} encoding: {reason}")]
    InvalidEncoding {
        /// Encoding name (base58, base64)
        encoding: &'static str,
        /// Decoder message
        reason: String,
    },
}
