use crate::ports::SignatureVerifier;
use shared_crypto::verify_base58;

/// Ed25519 verification of base58 keys and base64 signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, message: &str, signature: &str, pubkey: &str) -> bool {
        verify_base58(message, signature, pubkey)
    }
}
