//! # Global Rules
//!
//! Pure predicates over a block, its HEAD and its completed local index.
//! Every predicate reads only facts already gathered by the scope completer,
//! so rule evaluation never touches the store.
//!
//! Rules run in protocol order and the first failing one is reported.

use crate::domain::config::CurrencyParameters;
use crate::domain::entries::{BlockIndex, MembershipType, Op};
use crate::domain::error::Rule;
use crate::domain::head::Head;
use shared_types::constants::{MIN_MAX_BLOCK_SIZE, POW_UPPER_BOUND, TX_WINDOW};
use shared_types::Block;
use tracing::debug;

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub block: &'a Block,
    pub head: &'a Head,
    pub head_1: Option<&'a Head>,
    pub index: &'a BlockIndex,
    pub params: &'a CurrencyParameters,
    /// Members the store flags for exclusion.
    pub to_be_kicked: &'a [String],
}

type Predicate = fn(&RuleContext<'_>) -> bool;

const RULES: &[(Rule, Predicate)] = &[
    (Rule::Version, version),
    (Rule::BlockSize, block_size),
    (Rule::Currency, currency),
    (Rule::Number, |c| c.block.number == c.head.number),
    (Rule::PreviousHash, previous_hash),
    (Rule::PreviousIssuer, previous_issuer),
    (Rule::IssuerIsMember, |c| c.head.issuer_is_member),
    (Rule::IssuersCount, |c| c.block.issuers_count == c.head.issuers_count),
    (Rule::IssuersFrame, |c| c.block.issuers_frame == c.head.issuers_frame),
    (Rule::IssuersFrameVar, |c| {
        c.block.issuers_frame_var == c.head.issuers_frame_var
    }),
    (Rule::MedianTime, |c| c.block.median_time == c.head.median_time),
    (Rule::Dividend, |c| c.block.dividend == c.head.new_dividend),
    (Rule::UnitBase, |c| c.block.unit_base == c.head.unit_base),
    (Rule::MembersCount, |c| c.block.members_count == c.head.members_count),
    (Rule::PowMin, pow_min),
    (Rule::ProofOfWork, |c| proof_of_work(c.head)),
    (Rule::IdentityWritability, |c| {
        c.index.iindex.iter().all(|e| e.facts.age <= c.params.idty_window)
    }),
    (Rule::MembershipWritability, |c| {
        c.index.mindex.iter().all(|e| e.facts.age <= c.params.ms_window)
    }),
    (Rule::MembershipPeriod, |c| {
        c.index.mindex.iter().all(|e| e.facts.unchainables == 0)
    }),
    (Rule::CertificationWritability, |c| {
        c.index.cindex.iter().all(|e| e.facts.age <= c.params.sig_window)
    }),
    (Rule::CertificationStock, |c| {
        c.index.cindex.iter().all(|e| e.facts.stock <= c.params.sig_stock)
    }),
    (Rule::CertificationPeriod, |c| {
        c.index.cindex.iter().all(|e| e.facts.unchainables == 0)
    }),
    (Rule::CertificationFromMember, |c| {
        c.head.number == 0 || c.index.cindex.iter().all(|e| e.facts.from_member)
    }),
    (Rule::CertificationToMemberOrNewcomer, |c| {
        c.index
            .cindex
            .iter()
            .all(|e| e.facts.to_member || e.facts.to_newcomer)
    }),
    (Rule::CertificationToLeaver, |c| {
        c.index.cindex.iter().all(|e| !e.facts.to_leaver)
    }),
    (Rule::CertificationReplay, |c| {
        c.index.cindex.iter().all(|e| !e.facts.is_replay)
    }),
    (Rule::CertificationSignature, |c| {
        c.index.cindex.iter().all(|e| e.facts.sig_ok)
    }),
    (Rule::IdentityUidUnicity, |c| {
        c.index.newcomers().all(|e| e.facts.uid_unique)
    }),
    (Rule::IdentityPubkeyUnicity, |c| {
        c.index.newcomers().all(|e| e.facts.pub_unique)
    }),
    (Rule::MembershipSuccession, |c| {
        c.index
            .mindex
            .iter()
            .filter(|e| e.revoked_on.is_none())
            .all(|e| e.facts.number_following)
    }),
    (Rule::MembershipDistance, |c| {
        c.index
            .mindex
            .iter()
            .filter(|e| e.revoked_on.is_none() && e.expires_on.is_some())
            .all(|e| e.facts.distance_ok)
    }),
    (Rule::MembershipOnRevoked, |c| {
        c.index.mindex.iter().all(|e| !e.facts.on_revoked)
    }),
    (Rule::MembershipJoinsTwice, |c| {
        c.index.mindex.iter().all(|e| !e.facts.joins_twice)
    }),
    (Rule::MembershipEnoughCerts, |c| {
        c.index
            .mindex
            .iter()
            .filter(|e| e.is_renewal())
            .all(|e| e.facts.enough_certs)
    }),
    (Rule::MembershipLeaverIsMember, |c| {
        c.index
            .mindex
            .iter()
            .filter(|e| e.kind == Some(MembershipType::Leave))
            .all(|e| e.facts.leaver_is_member)
    }),
    (Rule::MembershipActiveIsMember, |c| {
        c.index
            .mindex
            .iter()
            .filter(|e| e.kind == Some(MembershipType::Active))
            .all(|e| e.facts.active_is_member)
    }),
    (Rule::MembershipRevokedIsMember, |c| {
        c.index
            .mindex
            .iter()
            .filter(|e| e.revoked_on.is_some())
            .all(|e| e.facts.revoked_is_member)
    }),
    (Rule::MembershipRevokedSingleton, |c| {
        c.index
            .mindex
            .iter()
            .filter(|e| e.revoked_on.is_some())
            .all(|e| !e.facts.already_revoked)
    }),
    (Rule::MembershipRevocationSignature, |c| {
        c.index
            .mindex
            .iter()
            .filter(|e| e.revoked_on.is_some())
            .all(|e| e.facts.revocation_sig_ok)
    }),
    (Rule::MembershipExcludedIsMember, |c| {
        c.index
            .iindex
            .iter()
            .filter(|e| e.member == Some(false))
            .all(|e| e.facts.excluded_is_member)
    }),
    (Rule::ToBeKickedArePresent, to_be_kicked_are_present),
    (Rule::TxWritability, |c| {
        c.index.inputs().all(|e| e.facts.age <= TX_WINDOW)
    }),
    (Rule::InputIsAvailable, |c| c.index.inputs().all(|e| e.facts.available)),
    (Rule::InputIsUnlocked, |c| c.index.inputs().all(|e| !e.facts.is_locked)),
    (Rule::InputIsTimeUnlocked, |c| {
        c.index.inputs().all(|e| !e.facts.is_time_locked)
    }),
    (Rule::OutputBase, output_base),
];

/// Evaluate every global rule in order; the first failure is returned.
pub fn check_global_rules(ctx: &RuleContext<'_>) -> Result<(), Rule> {
    for (rule, predicate) in RULES {
        if !predicate(ctx) {
            debug!(
                "[lc-02] Block #{} rejected by {}",
                ctx.block.number,
                rule.name()
            );
            return Err(*rule);
        }
    }
    Ok(())
}

/// Maximum accepted block size for a HEAD.
pub fn max_block_size(head: &Head) -> u64 {
    let grown = (1.1 * head.avg_block_size as f64).ceil() as u64;
    MIN_MAX_BLOCK_SIZE.max(grown)
}

/// `true` when `head.hash` satisfies the personalized difficulty.
pub fn proof_of_work(head: &Head) -> bool {
    let zeros = head.pow_zeros as usize;
    let mut chars = head.hash.chars();
    if !chars.by_ref().take(zeros).all(|c| c == '0') || head.hash.len() <= zeros {
        return false;
    }
    let bound = POW_UPPER_BOUND[head.pow_remainder as usize % POW_UPPER_BOUND.len()];
    match (chars.next().and_then(|c| c.to_digit(16)), bound.to_digit(16)) {
        (Some(next), Some(bound)) => next <= bound,
        _ => false,
    }
}

fn version(c: &RuleContext<'_>) -> bool {
    match c.head_1 {
        None => true,
        Some(head_1) => {
            c.block.version == head_1.version || c.block.version == head_1.version + 1
        }
    }
}

fn block_size(c: &RuleContext<'_>) -> bool {
    c.head.number == 0 || c.head.bsize < max_block_size(c.head)
}

fn currency(c: &RuleContext<'_>) -> bool {
    c.head.number == 0 || c.block.currency == c.head.currency
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn previous_hash(c: &RuleContext<'_>) -> bool {
    non_empty(&c.block.previous_hash) == non_empty(&c.head.previous_hash)
}

fn previous_issuer(c: &RuleContext<'_>) -> bool {
    non_empty(&c.block.previous_issuer) == non_empty(&c.head.previous_issuer)
}

fn pow_min(c: &RuleContext<'_>) -> bool {
    c.head.number == 0 || c.block.pow_min == c.head.pow_min
}

fn to_be_kicked_are_present(c: &RuleContext<'_>) -> bool {
    let all_present = c.to_be_kicked.iter().all(|pubkey| {
        c.index
            .iindex
            .iter()
            .filter(|e| &e.pubkey == pubkey && e.facts.is_being_kicked)
            .count()
            == 1
    });
    all_present
        && c
            .index
            .iindex
            .iter()
            .filter(|e| e.member == Some(false))
            .all(|e| e.facts.has_to_be_excluded)
}

fn output_base(c: &RuleContext<'_>) -> bool {
    match c.head_1 {
        None => true,
        Some(head_1) => c
            .index
            .sindex
            .iter()
            .filter(|e| e.op == Op::Create)
            .all(|e| e.base <= head_1.unit_base),
    }
}
