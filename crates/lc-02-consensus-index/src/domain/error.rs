//! Error types for the consensus index
//!
//! A rejected block carries exactly one [`Rule`]. Its name is part of the
//! protocol: peers and tests match on it verbatim.

use lc_01_web_of_trust::WotError;
use shared_types::{Blockstamp, ParseError};
use std::fmt;

/// Named consensus predicates, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    Version,
    BlockSize,
    Currency,
    Number,
    PreviousHash,
    PreviousIssuer,
    IssuerIsMember,
    IssuersCount,
    IssuersFrame,
    IssuersFrameVar,
    MedianTime,
    Dividend,
    UnitBase,
    MembersCount,
    PowMin,
    ProofOfWork,
    IdentityWritability,
    MembershipWritability,
    MembershipPeriod,
    CertificationWritability,
    CertificationStock,
    CertificationPeriod,
    CertificationFromMember,
    CertificationToMemberOrNewcomer,
    CertificationToLeaver,
    CertificationReplay,
    CertificationSignature,
    IdentityUidUnicity,
    IdentityPubkeyUnicity,
    MembershipSuccession,
    MembershipDistance,
    MembershipOnRevoked,
    MembershipJoinsTwice,
    MembershipEnoughCerts,
    MembershipLeaverIsMember,
    MembershipActiveIsMember,
    MembershipRevokedIsMember,
    MembershipRevokedSingleton,
    MembershipRevocationSignature,
    MembershipExcludedIsMember,
    ToBeKickedArePresent,
    TxWritability,
    InputIsAvailable,
    InputIsUnlocked,
    InputIsTimeUnlocked,
    OutputBase,
}

impl Rule {
    /// Stable protocol identifier.
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Version => "ruleVersion",
            Rule::BlockSize => "ruleBlockSize",
            Rule::Currency => "ruleCurrency",
            Rule::Number => "ruleNumber",
            Rule::PreviousHash => "rulePreviousHash",
            Rule::PreviousIssuer => "rulePreviousIssuer",
            Rule::IssuerIsMember => "ruleIssuerIsMember",
            Rule::IssuersCount => "ruleIssuersCount",
            Rule::IssuersFrame => "ruleIssuersFrame",
            Rule::IssuersFrameVar => "ruleIssuersFrameVar",
            Rule::MedianTime => "ruleMedianTime",
            Rule::Dividend => "ruleDividend",
            Rule::UnitBase => "ruleUnitBase",
            Rule::MembersCount => "ruleMembersCount",
            Rule::PowMin => "rulePowMin",
            Rule::ProofOfWork => "ruleProofOfWork",
            Rule::IdentityWritability => "ruleIdentityWritability",
            Rule::MembershipWritability => "ruleMembershipWritability",
            Rule::MembershipPeriod => "ruleMembershipPeriod",
            Rule::CertificationWritability => "ruleCertificationWritability",
            Rule::CertificationStock => "ruleCertificationStock",
            Rule::CertificationPeriod => "ruleCertificationPeriod",
            Rule::CertificationFromMember => "ruleCertificationFromMember",
            Rule::CertificationToMemberOrNewcomer => "ruleCertificationToMemberOrNewcomer",
            Rule::CertificationToLeaver => "ruleCertificationToLeaver",
            Rule::CertificationReplay => "ruleCertificationReplay",
            Rule::CertificationSignature => "ruleCertificationSignature",
            Rule::IdentityUidUnicity => "ruleIdentityUIDUnicity",
            Rule::IdentityPubkeyUnicity => "ruleIdentityPubkeyUnicity",
            Rule::MembershipSuccession => "ruleMembershipSuccession",
            Rule::MembershipDistance => "ruleMembershipDistance",
            Rule::MembershipOnRevoked => "ruleMembershipOnRevoked",
            Rule::MembershipJoinsTwice => "ruleMembershipJoinsTwice",
            Rule::MembershipEnoughCerts => "ruleMembershipEnoughCerts",
            Rule::MembershipLeaverIsMember => "ruleMembershipLeaverIsMember",
            Rule::MembershipActiveIsMember => "ruleMembershipActiveIsMember",
            Rule::MembershipRevokedIsMember => "ruleMembershipRevokedIsMember",
            Rule::MembershipRevokedSingleton => "ruleMembershipRevokedSingleton",
            Rule::MembershipRevocationSignature => "ruleMembershipRevocationSignature",
            Rule::MembershipExcludedIsMember => "ruleMembershipExcludedIsMember",
            Rule::ToBeKickedArePresent => "ruleToBeKickedArePresent",
            Rule::TxWritability => "ruleTxWritability",
            Rule::InputIsAvailable => "ruleInputIsAvailable",
            Rule::InputIsUnlocked => "ruleInputIsUnlocked",
            Rule::InputIsTimeUnlocked => "ruleInputIsTimeUnlocked",
            Rule::OutputBase => "ruleOutputBase",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure of the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Block not found: {0}")]
    BlockNotFound(String),

    #[error("Write rejected: {0}")]
    WriteFailed(String),

    #[error("Inconsistent store: {0}")]
    Inconsistent(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Consensus error types
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    /// The block broke one named consensus rule.
    #[error("{0}")]
    RuleViolation(Rule),

    #[error("Malformed block: {0}")]
    Structural(#[from] ParseError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Trust graph error: {0}")]
    Wot(#[from] WotError),

    #[error("Block {0} is not the current block")]
    NotCurrent(Blockstamp),

    #[error("No block to revert")]
    EmptyChain,

    #[error("Fork point {fork_point} is above the current block {current}")]
    InvalidForkPoint { fork_point: u64, current: u64 },

    #[error("Fork point {fork_point} is older than the fork window ({window} blocks)")]
    ForkTooOld { fork_point: u64, window: u64 },

    /// A revert could not be completed. The node state needs operator attention.
    #[error("Revert failed, fork switching halted: {0}")]
    RevertHalted(String),

    #[error("Invalid currency parameters: {0}")]
    InvalidParameters(String),
}

impl ConsensusError {
    /// The rule that rejected the block, if any.
    pub fn rule(&self) -> Option<Rule> {
        match self {
            ConsensusError::RuleViolation(rule) => Some(*rule),
            _ => None,
        }
    }
}

impl From<Rule> for ConsensusError {
    fn from(rule: Rule) -> Self {
        ConsensusError::RuleViolation(rule)
    }
}

pub type ConsensusResult<T> = Result<T, ConsensusError>;
