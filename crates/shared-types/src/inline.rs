//! # Inline Records
//!
//! Compact colon-delimited encodings carried in block sections. Fields are
//! positional:
//!
//! ```text
//! identity       PUBKEY:SIGNATURE:BUID:UID
//! membership     PUBKEY:SIGNATURE:NUMBER-HASH:IDTY_BUID:UID
//! certification  FROM:TO:BLOCK_NUMBER:SIGNATURE
//! revocation     PUBKEY:SIGNATURE
//! tx input       AMOUNT:BASE:TYPE:IDENTIFIER:POS
//! tx output      AMOUNT:BASE:CONDITIONS
//! tx unlock      INDEX:PARAM PARAM ...
//! ```

use crate::blockstamp::Blockstamp;
use crate::errors::{ParseError, ParseResult};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

fn split_fields<'a>(raw: &'a str, kind: &'static str, expected: usize) -> ParseResult<Vec<&'a str>> {
    let fields: Vec<&str> = raw.splitn(expected, ':').collect();
    if fields.len() != expected {
        return Err(ParseError::FieldCount {
            kind,
            expected,
            actual: fields.len(),
            raw: raw.to_string(),
        });
    }
    Ok(fields)
}

fn non_empty<'a>(value: &'a str, field: &'static str) -> ParseResult<&'a str> {
    if value.is_empty() {
        Err(ParseError::EmptyField(field))
    } else {
        Ok(value)
    }
}

fn parse_number<T: FromStr>(value: &str, kind: &'static str) -> ParseResult<T> {
    value.parse::<T>().map_err(|_| ParseError::InvalidNumber {
        kind,
        value: value.to_string(),
    })
}

// =============================================================================
// WEB OF TRUST RECORDS
// =============================================================================

/// Identity declaration of a newcomer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub pubkey: String,
    pub sig: String,
    pub buid: Blockstamp,
    pub uid: String,
}

impl IdentityRecord {
    /// Target hash of the identity: `SHA256(uid ++ buid ++ pubkey)`, uppercase hex.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.uid.as_bytes());
        hasher.update(self.buid.to_string().as_bytes());
        hasher.update(self.pubkey.as_bytes());
        hex::encode_upper(hasher.finalize())
    }
}

impl FromStr for IdentityRecord {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let f = split_fields(raw, "identity", 4)?;
        Ok(Self {
            pubkey: non_empty(f[0], "pubkey")?.to_string(),
            sig: non_empty(f[1], "signature")?.to_string(),
            buid: f[2].parse()?,
            uid: non_empty(f[3], "uid")?.to_string(),
        })
    }
}

/// Membership document (join, renewal or leave).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRecord {
    pub issuer: String,
    pub sig: String,
    pub blockstamp: Blockstamp,
    pub idty_buid: Blockstamp,
    pub uid: String,
}

impl FromStr for MembershipRecord {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let f = split_fields(raw, "membership", 5)?;
        Ok(Self {
            issuer: non_empty(f[0], "pubkey")?.to_string(),
            sig: non_empty(f[1], "signature")?.to_string(),
            blockstamp: f[2].parse()?,
            idty_buid: f[3].parse()?,
            uid: non_empty(f[4], "uid")?.to_string(),
        })
    }
}

/// Certification of `receiver` by `issuer`, based on block `block_number`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificationRecord {
    pub issuer: String,
    pub receiver: String,
    pub block_number: u64,
    pub sig: String,
}

impl FromStr for CertificationRecord {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let f = split_fields(raw, "certification", 4)?;
        Ok(Self {
            issuer: non_empty(f[0], "issuer")?.to_string(),
            receiver: non_empty(f[1], "receiver")?.to_string(),
            block_number: parse_number(f[2], "certification")?,
            sig: non_empty(f[3], "signature")?.to_string(),
        })
    }
}

/// Revocation of an identity by its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationRecord {
    pub pubkey: String,
    pub revocation: String,
}

impl FromStr for RevocationRecord {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let f = split_fields(raw, "revocation", 2)?;
        Ok(Self {
            pubkey: non_empty(f[0], "pubkey")?.to_string(),
            revocation: non_empty(f[1], "signature")?.to_string(),
        })
    }
}

// =============================================================================
// TRANSACTION RECORDS
// =============================================================================

/// Kind of money source being spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// Universal dividend: identifier is the member pubkey, pos the block number.
    Dividend,
    /// Transaction output: identifier is the tx hash, pos the output index.
    Transaction,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Dividend => write!(f, "D"),
            SourceType::Transaction => write!(f, "T"),
        }
    }
}

/// A source consumed by a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub amount: u64,
    pub base: u32,
    pub source_type: SourceType,
    pub identifier: String,
    pub pos: u64,
}

impl FromStr for TxInput {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let f = split_fields(raw, "input", 5)?;
        let source_type = match f[2] {
            "D" => SourceType::Dividend,
            "T" => SourceType::Transaction,
            other => return Err(ParseError::InvalidSourceType(other.to_string())),
        };
        Ok(Self {
            amount: parse_number(f[0], "input")?,
            base: parse_number(f[1], "input")?,
            source_type,
            identifier: non_empty(f[3], "identifier")?.to_string(),
            pos: parse_number(f[4], "input")?,
        })
    }
}

/// A source created by a transaction, locked by `conditions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub amount: u64,
    pub base: u32,
    pub conditions: String,
}

impl FromStr for TxOutput {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let f = split_fields(raw, "output", 3)?;
        Ok(Self {
            amount: parse_number(f[0], "output")?,
            base: parse_number(f[1], "output")?,
            conditions: non_empty(f[2], "conditions")?.to_string(),
        })
    }
}

/// A proof offered to satisfy an output condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockParam {
    /// Signature of the transaction issuer at this index.
    Sig(usize),
    /// Preimage whose SHA-256 must match an `XHX` condition.
    Xhx(String),
}

impl FromStr for UnlockParam {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let inner = |prefix: &str| {
            raw.strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(')'))
                .filter(|param| !param.is_empty())
        };
        if let Some(index) = inner("SIG(") {
            let index = index
                .parse::<usize>()
                .map_err(|_| ParseError::InvalidUnlock(raw.to_string()))?;
            Ok(UnlockParam::Sig(index))
        } else if let Some(preimage) = inner("XHX(") {
            Ok(UnlockParam::Xhx(preimage.to_string()))
        } else {
            Err(ParseError::InvalidUnlock(raw.to_string()))
        }
    }
}

/// Unlock line: `INDEX:PARAM PARAM ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxUnlock {
    pub index: usize,
    pub params: Vec<UnlockParam>,
}

impl FromStr for TxUnlock {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let f = split_fields(raw, "unlock", 2)?;
        let params = f[1]
            .split_whitespace()
            .map(str::parse)
            .collect::<ParseResult<Vec<UnlockParam>>>()?;
        Ok(Self {
            index: parse_number(f[0], "unlock")?,
            params,
        })
    }
}
