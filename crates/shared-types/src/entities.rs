//! # Core Wire Entities
//!
//! Blocks and transactions as they travel on the wire. Sections are kept in
//! their compact inline form; typed views are produced on demand by the
//! accessor methods.

use crate::blockstamp::Blockstamp;
use crate::documents;
use crate::errors::ParseResult;
use crate::inline::{
    CertificationRecord, IdentityRecord, MembershipRecord, RevocationRecord, TxInput, TxOutput,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// =============================================================================
// BLOCK
// =============================================================================

/// A block of the chain, immutable once signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Block {
    pub version: u32,
    pub currency: String,
    pub number: u64,
    pub hash: String,
    pub previous_hash: Option<String>,
    pub previous_issuer: Option<String>,
    pub issuer: String,
    pub time: u64,
    pub median_time: u64,
    pub pow_min: u32,
    /// Universal dividend created by this block, if any.
    pub dividend: Option<u64>,
    #[serde(rename = "unitbase")]
    pub unit_base: u32,
    pub members_count: u64,
    pub monetary_mass: u64,
    pub issuers_count: u64,
    pub issuers_frame: u64,
    pub issuers_frame_var: i64,
    pub identities: Vec<String>,
    pub joiners: Vec<String>,
    pub actives: Vec<String>,
    pub leavers: Vec<String>,
    pub revoked: Vec<String>,
    pub excluded: Vec<String>,
    pub certifications: Vec<String>,
    pub transactions: Vec<Transaction>,
    /// `true` when stored as a side-branch block.
    pub fork: bool,
}

impl Block {
    pub fn blockstamp(&self) -> Blockstamp {
        Blockstamp::new(self.number, self.hash.clone())
    }

    /// Size of the block in document lines, as bounded by the block size rule.
    ///
    /// Excluded members do not count.
    pub fn size(&self) -> u64 {
        let wot_lines = self.identities.len()
            + self.joiners.len()
            + self.actives.len()
            + self.leavers.len()
            + self.revoked.len()
            + self.certifications.len();
        let tx_lines: u64 = self.transactions.iter().map(Transaction::size).sum();
        wot_lines as u64 + tx_lines
    }

    /// Inline identity of `pubkey` declared in this block, if any.
    pub fn inline_identity(&self, pubkey: &str) -> ParseResult<Option<IdentityRecord>> {
        for raw in &self.identities {
            let idty: IdentityRecord = raw.parse()?;
            if idty.pubkey == pubkey {
                return Ok(Some(idty));
            }
        }
        Ok(None)
    }

    pub fn parsed_identities(&self) -> ParseResult<Vec<IdentityRecord>> {
        self.identities.iter().map(|raw| raw.parse()).collect()
    }

    pub fn parsed_joiners(&self) -> ParseResult<Vec<MembershipRecord>> {
        self.joiners.iter().map(|raw| raw.parse()).collect()
    }

    pub fn parsed_actives(&self) -> ParseResult<Vec<MembershipRecord>> {
        self.actives.iter().map(|raw| raw.parse()).collect()
    }

    pub fn parsed_leavers(&self) -> ParseResult<Vec<MembershipRecord>> {
        self.leavers.iter().map(|raw| raw.parse()).collect()
    }

    pub fn parsed_revoked(&self) -> ParseResult<Vec<RevocationRecord>> {
        self.revoked.iter().map(|raw| raw.parse()).collect()
    }

    pub fn parsed_certifications(&self) -> ParseResult<Vec<CertificationRecord>> {
        self.certifications.iter().map(|raw| raw.parse()).collect()
    }

    /// `true` when the block carries nothing but chain metadata.
    pub fn is_empty_of_documents(&self) -> bool {
        self.identities.is_empty()
            && self.joiners.is_empty()
            && self.actives.is_empty()
            && self.leavers.is_empty()
            && self.revoked.is_empty()
            && self.excluded.is_empty()
            && self.certifications.is_empty()
            && self.transactions.is_empty()
    }
}

// =============================================================================
// TRANSACTION
// =============================================================================

/// A transaction document as embedded in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Transaction {
    pub version: u32,
    pub currency: String,
    /// Reference block of the transaction.
    pub blockstamp: String,
    pub locktime: u64,
    pub issuers: Vec<String>,
    pub inputs: Vec<String>,
    pub unlocks: Vec<String>,
    pub outputs: Vec<String>,
    pub comment: String,
    pub signatures: Vec<String>,
    /// Uppercase SHA-256 of the raw document. Computed when absent.
    pub hash: Option<String>,
}

impl Transaction {
    /// Size in document lines.
    pub fn size(&self) -> u64 {
        let comment = if self.comment.is_empty() { 0 } else { 1 };
        (2 + self.issuers.len() * 2 + self.inputs.len() * 2 + comment + self.outputs.len()) as u64
    }

    pub fn parsed_inputs(&self) -> ParseResult<Vec<TxInput>> {
        self.inputs.iter().map(|raw| raw.parse()).collect()
    }

    pub fn parsed_outputs(&self) -> ParseResult<Vec<TxOutput>> {
        self.outputs.iter().map(|raw| raw.parse()).collect()
    }

    /// Raw document without signatures: the message each issuer signs.
    pub fn raw_without_signatures(&self) -> String {
        documents::transaction_raw(self, false)
    }

    /// The declared hash, or the SHA-256 of the full raw document.
    pub fn hash(&self) -> String {
        match &self.hash {
            Some(hash) if !hash.is_empty() => hash.clone(),
            _ => {
                let raw = documents::transaction_raw(self, true);
                hex::encode_upper(Sha256::digest(raw.as_bytes()))
            }
        }
    }
}
