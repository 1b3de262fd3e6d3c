//! # Canonical Raw Documents
//!
//! Texts whose signatures are checked by consensus. Every line ends with `\n`
//! and the exact layout is part of the protocol.

use crate::constants::DOCUMENTS_VERSION;
use crate::entities::Transaction;

fn header(doctype: &str, currency: &str, issuer: &str) -> String {
    format!(
        "Version: {}\nType: {}\nCurrency: {}\nIssuer: {}\n",
        DOCUMENTS_VERSION, doctype, currency, issuer
    )
}

/// Identity being certified or revoked, as referenced by other documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRef<'a> {
    pub pubkey: &'a str,
    pub uid: &'a str,
    pub buid: &'a str,
    pub sig: &'a str,
}

/// Unsigned identity document.
pub fn identity_raw(currency: &str, idty: &IdentityRef<'_>) -> String {
    format!(
        "Version: {}\nType: Identity\nCurrency: {}\nIssuer: {}\nUniqueID: {}\nTimestamp: {}\n",
        DOCUMENTS_VERSION, currency, idty.pubkey, idty.uid, idty.buid
    )
}

/// Unsigned certification document of `idty` by `issuer`, based on `cert_buid`.
pub fn certification_raw(
    currency: &str,
    issuer: &str,
    idty: &IdentityRef<'_>,
    cert_buid: &str,
) -> String {
    let mut raw = header("Certification", currency, issuer);
    raw.push_str(&format!("IdtyIssuer: {}\n", idty.pubkey));
    raw.push_str(&format!("IdtyUniqueID: {}\n", idty.uid));
    raw.push_str(&format!("IdtyTimestamp: {}\n", idty.buid));
    raw.push_str(&format!("IdtySignature: {}\n", idty.sig));
    raw.push_str(&format!("CertTimestamp: {}\n", cert_buid));
    raw
}

/// Unsigned revocation document of `idty` by its owner.
pub fn revocation_raw(currency: &str, idty: &IdentityRef<'_>) -> String {
    let mut raw = header("Revocation", currency, idty.pubkey);
    raw.push_str(&format!("IdtyUniqueID: {}\n", idty.uid));
    raw.push_str(&format!("IdtyTimestamp: {}\n", idty.buid));
    raw.push_str(&format!("IdtySignature: {}\n", idty.sig));
    raw
}

/// Raw transaction document, optionally followed by its signatures.
pub fn transaction_raw(tx: &Transaction, with_signatures: bool) -> String {
    let mut raw = format!(
        "Version: {}\nType: Transaction\nCurrency: {}\nBlockstamp: {}\nLocktime: {}\n",
        tx.version, tx.currency, tx.blockstamp, tx.locktime
    );
    let mut section = |title: &str, lines: &[String]| {
        raw.push_str(title);
        raw.push('\n');
        for line in lines {
            raw.push_str(line);
            raw.push('\n');
        }
    };
    section("Issuers:", &tx.issuers);
    section("Inputs:", &tx.inputs);
    section("Unlocks:", &tx.unlocks);
    section("Outputs:", &tx.outputs);
    raw.push_str(&format!("Comment: {}\n", tx.comment));
    if with_signatures {
        for sig in &tx.signatures {
            raw.push_str(sig);
            raw.push('\n');
        }
    }
    raw
}
