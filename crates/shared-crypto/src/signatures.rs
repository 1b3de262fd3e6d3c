//! # Ed25519 Signatures
//!
//! Document signatures. Public keys are exchanged in base58, signatures in
//! base64, and the signed message is always the UTF-8 raw document.
//!
//! ## Security Properties
//!
//! - No RNG dependency when signing (deterministic nonce from message)
//! - Malformed keys or signatures never verify

use crate::CryptoError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroize;

/// Ed25519 public key (32 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519PublicKey([u8; 32]);

impl Ed25519PublicKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Decode a base58 public key.
    pub fn from_base58(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| CryptoError::InvalidEncoding {
                encoding: "base58",
                reason: e.to_string(),
            })?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Self::from_bytes(bytes)
    }

    /// Encode as base58.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Verify a signature.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;

        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

/// Ed25519 signature (64 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519Signature([u8; 64]);

impl Ed25519Signature {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Decode a base64 signature.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidEncoding {
                encoding: "base64",
                reason: e.to_string(),
            })?;
        let bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignatureFormat)?;
        Ok(Self(bytes))
    }

    /// Encode as base64.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

/// Verify a base64 signature of `message` against a base58 public key.
///
/// Any decoding failure counts as an invalid signature.
pub fn verify_base58(message: &str, signature: &str, pubkey: &str) -> bool {
    let Ok(pubkey) = Ed25519PublicKey::from_base58(pubkey) else {
        return false;
    };
    let Ok(signature) = Ed25519Signature::from_base64(signature) else {
        return false;
    };
    pubkey.verify(message.as_bytes(), &signature).is_ok()
}

/// Ed25519 keypair.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
}

impl Ed25519KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret seed (32 bytes).
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        Self { signing_key }
    }

    /// Get public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        let verifying_key = self.signing_key.verifying_key();
        Ed25519PublicKey(verifying_key.to_bytes())
    }

    /// Base58 public key, as written in documents.
    pub fn pubkey(&self) -> String {
        self.public_key().to_base58()
    }

    /// Sign a message (deterministic - no RNG needed).
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        let sig = self.signing_key.sign(message);
        Ed25519Signature(sig.to_bytes())
    }

    /// Sign a raw document and return the base64 signature.
    pub fn sign_document(&self, raw: &str) -> String {
        self.sign(raw.as_bytes()).to_base64()
    }
}

impl Drop for Ed25519KeyPair {
    fn drop(&mut self) {
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}
