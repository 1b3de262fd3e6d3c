//! # Index Entries
//!
//! One typed record per state effect of a block. A `CREATE` entry carries the
//! full record, an `UPDATE` entry only the fields it changes: `None` means
//! "unchanged". The single field that can also be erased, a membership's
//! `expired_on`, uses [`Patch`] so that clearing is explicit.
//!
//! Every entry also carries a `facts` value: the derived flags and counters
//! computed by the scope completer for the rules. Facts are never persisted.

use lc_01_web_of_trust::WotId;
use serde::{Deserialize, Serialize};
use shared_types::Blockstamp;

/// Kind of write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Op {
    Create,
    Update,
}

/// Partial value of a clearable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Patch<T> {
    /// The entry does not touch the field.
    Keep,
    Set(T),
    /// The entry erases the field.
    Clear,
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Keep
    }
}

impl<T: Clone> Patch<T> {
    /// Current value once folded: `Keep` and `Clear` both read as absent.
    pub fn get(&self) -> Option<&T> {
        match self {
            Patch::Set(value) => Some(value),
            Patch::Keep | Patch::Clear => None,
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Patch::Set(_))
    }

    /// Fold a newer patch over this one.
    pub fn merge(&mut self, newer: &Patch<T>) {
        match newer {
            Patch::Keep => {}
            Patch::Set(value) => *self = Patch::Set(value.clone()),
            Patch::Clear => *self = Patch::Clear,
        }
    }
}

// === IDENTITIES (IINDEX) ===

/// Derived facts of an identity entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityFacts {
    pub age: u64,
    pub uid_unique: bool,
    pub pub_unique: bool,
    pub excluded_is_member: bool,
    pub is_being_kicked: bool,
    pub has_to_be_excluded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityEntry {
    pub op: Op,
    pub pubkey: String,
    pub uid: Option<String>,
    pub hash: Option<String>,
    pub sig: Option<String>,
    pub created_on: Option<Blockstamp>,
    pub written_on: Blockstamp,
    pub member: Option<bool>,
    pub was_member: Option<bool>,
    pub kick: Option<bool>,
    pub wotb_id: Option<WotId>,
    #[serde(skip)]
    pub facts: IdentityFacts,
}

impl IdentityEntry {
    /// Update entry that changes nothing yet.
    pub fn update(pubkey: impl Into<String>, written_on: Blockstamp) -> Self {
        Self {
            op: Op::Update,
            pubkey: pubkey.into(),
            uid: None,
            hash: None,
            sig: None,
            created_on: None,
            written_on,
            member: None,
            was_member: None,
            kick: None,
            wotb_id: None,
            facts: IdentityFacts::default(),
        }
    }

    pub fn is_member(&self) -> bool {
        self.member == Some(true)
    }
}

// === MEMBERSHIPS (MINDEX) ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MembershipType {
    Join,
    Active,
    Leave,
}

/// Derived facts of a membership entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipFacts {
    pub age: u64,
    pub unchainables: u64,
    pub number_following: bool,
    pub distance_ok: bool,
    pub on_revoked: bool,
    pub joins_twice: bool,
    pub enough_certs: bool,
    pub leaver_is_member: bool,
    pub active_is_member: bool,
    pub revoked_is_member: bool,
    pub already_revoked: bool,
    pub revocation_sig_ok: bool,
    pub is_being_revoked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipEntry {
    pub op: Op,
    pub pubkey: String,
    pub created_on: Option<Blockstamp>,
    pub written_on: Blockstamp,
    pub kind: Option<MembershipType>,
    pub expires_on: Option<u64>,
    pub expired_on: Patch<u64>,
    pub revokes_on: Option<u64>,
    /// Block where the revocation was written.
    pub revoked_on: Option<Blockstamp>,
    pub revocation: Option<String>,
    pub chainable_on: Option<u64>,
    pub leaving: Option<bool>,
    #[serde(skip)]
    pub facts: MembershipFacts,
}

impl MembershipEntry {
    pub fn update(pubkey: impl Into<String>, written_on: Blockstamp) -> Self {
        Self {
            op: Op::Update,
            pubkey: pubkey.into(),
            created_on: None,
            written_on,
            kind: None,
            expires_on: None,
            expired_on: Patch::Keep,
            revokes_on: None,
            revoked_on: None,
            revocation: None,
            chainable_on: None,
            leaving: None,
            facts: MembershipFacts::default(),
        }
    }

    /// `JOIN` or `ACTIVE`: the membership (re)starts a validity period.
    pub fn is_renewal(&self) -> bool {
        matches!(
            self.kind,
            Some(MembershipType::Join) | Some(MembershipType::Active)
        )
    }
}

// === CERTIFICATIONS (CINDEX) ===

/// Derived facts of a certification entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificationFacts {
    pub age: u64,
    pub unchainables: u64,
    pub stock: u64,
    pub from_member: bool,
    pub to_member: bool,
    pub to_newcomer: bool,
    pub to_leaver: bool,
    pub is_replay: bool,
    pub sig_ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificationEntry {
    pub op: Op,
    pub issuer: String,
    pub receiver: String,
    /// Number of the block the certification is based on.
    pub created_on: u64,
    pub written_on: Blockstamp,
    pub sig: Option<String>,
    pub chainable_on: Option<u64>,
    pub expires_on: Option<u64>,
    /// `Some(0)` while valid, the expiry median time afterwards.
    pub expired_on: Option<u64>,
    #[serde(skip)]
    pub facts: CertificationFacts,
}

impl CertificationEntry {
    pub fn update(
        issuer: impl Into<String>,
        receiver: impl Into<String>,
        created_on: u64,
        written_on: Blockstamp,
    ) -> Self {
        Self {
            op: Op::Update,
            issuer: issuer.into(),
            receiver: receiver.into(),
            created_on,
            written_on,
            sig: None,
            chainable_on: None,
            expires_on: None,
            expired_on: None,
            facts: CertificationFacts::default(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.expired_on == Some(0)
    }
}

// === SOURCES (SINDEX) ===

/// Derived facts of a source entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFacts {
    pub age: u64,
    pub available: bool,
    pub is_locked: bool,
    pub is_time_locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub op: Op,
    /// Transaction hash, or the member pubkey for a dividend.
    pub identifier: String,
    /// Output index, or the block number for a dividend.
    pub pos: u64,
    pub tx: Option<String>,
    pub created_on: Option<Blockstamp>,
    pub written_on: Blockstamp,
    pub written_time: u64,
    pub locktime: u64,
    pub unlock: Option<String>,
    pub amount: u64,
    pub base: u32,
    pub conditions: Option<String>,
    pub consumed: bool,
    /// Position of the spending transaction in its block.
    #[serde(skip)]
    pub tx_index: Option<usize>,
    #[serde(skip)]
    pub facts: SourceFacts,
}

impl SourceEntry {
    /// Amount expressed in base 0.
    pub fn value(&self) -> i64 {
        let factor = 10i64.saturating_pow(self.base);
        (self.amount as i64).saturating_mul(factor)
    }

    /// Same source as `other` (same identifier and position).
    pub fn same_source(&self, other: &SourceEntry) -> bool {
        self.identifier == other.identifier && self.pos == other.pos
    }
}

/// Balance of one spending condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub conditions: String,
    pub balance: i64,
}

impl Wallet {
    pub fn new(conditions: impl Into<String>) -> Self {
        Self {
            conditions: conditions.into(),
            balance: 0,
        }
    }
}

// === TAGGED UNION ===

/// Any index entry.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexEntry {
    Identity(IdentityEntry),
    Membership(MembershipEntry),
    Certification(CertificationEntry),
    Source(SourceEntry),
}

impl IndexEntry {
    pub fn op(&self) -> Op {
        match self {
            IndexEntry::Identity(e) => e.op,
            IndexEntry::Membership(e) => e.op,
            IndexEntry::Certification(e) => e.op,
            IndexEntry::Source(e) => e.op,
        }
    }

    pub fn written_on(&self) -> &Blockstamp {
        match self {
            IndexEntry::Identity(e) => &e.written_on,
            IndexEntry::Membership(e) => &e.written_on,
            IndexEntry::Certification(e) => &e.written_on,
            IndexEntry::Source(e) => &e.written_on,
        }
    }
}

impl From<IdentityEntry> for IndexEntry {
    fn from(e: IdentityEntry) -> Self {
        IndexEntry::Identity(e)
    }
}

impl From<MembershipEntry> for IndexEntry {
    fn from(e: MembershipEntry) -> Self {
        IndexEntry::Membership(e)
    }
}

impl From<CertificationEntry> for IndexEntry {
    fn from(e: CertificationEntry) -> Self {
        IndexEntry::Certification(e)
    }
}

impl From<SourceEntry> for IndexEntry {
    fn from(e: SourceEntry) -> Self {
        IndexEntry::Source(e)
    }
}

/// Entries of one block, split by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockIndex {
    pub iindex: Vec<IdentityEntry>,
    pub mindex: Vec<MembershipEntry>,
    pub cindex: Vec<CertificationEntry>,
    pub sindex: Vec<SourceEntry>,
}

impl BlockIndex {
    pub fn push(&mut self, entry: impl Into<IndexEntry>) {
        match entry.into() {
            IndexEntry::Identity(e) => self.iindex.push(e),
            IndexEntry::Membership(e) => self.mindex.push(e),
            IndexEntry::Certification(e) => self.cindex.push(e),
            IndexEntry::Source(e) => self.sindex.push(e),
        }
    }

    pub fn extend(&mut self, other: BlockIndex) {
        self.iindex.extend(other.iindex);
        self.mindex.extend(other.mindex);
        self.cindex.extend(other.cindex);
        self.sindex.extend(other.sindex);
    }

    pub fn len(&self) -> usize {
        self.iindex.len() + self.mindex.len() + self.cindex.len() + self.sindex.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry, identities first and sources last.
    pub fn into_entries(self) -> Vec<IndexEntry> {
        let mut entries = Vec::with_capacity(self.len());
        entries.extend(self.iindex.into_iter().map(IndexEntry::from));
        entries.extend(self.mindex.into_iter().map(IndexEntry::from));
        entries.extend(self.cindex.into_iter().map(IndexEntry::from));
        entries.extend(self.sindex.into_iter().map(IndexEntry::from));
        entries
    }

    /// Identity entries creating a new identity.
    pub fn newcomers(&self) -> impl Iterator<Item = &IdentityEntry> {
        self.iindex.iter().filter(|e| e.op == Op::Create)
    }

    /// Source entries spending an existing source.
    pub fn inputs(&self) -> impl Iterator<Item = &SourceEntry> {
        self.sindex.iter().filter(|e| e.op == Op::Update)
    }
}

impl FromIterator<IndexEntry> for BlockIndex {
    fn from_iter<I: IntoIterator<Item = IndexEntry>>(iter: I) -> Self {
        let mut index = BlockIndex::default();
        for entry in iter {
            index.push(entry);
        }
        index
    }
}
