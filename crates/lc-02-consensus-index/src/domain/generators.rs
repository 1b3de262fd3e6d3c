//! Pure parts of the post-HEAD generators: dividend creation, balance
//! variations and expiry date corrections. The store-backed passes live in
//! [`crate::generation`].

use crate::domain::entries::{CertificationEntry, MembershipEntry, Op, SourceEntry, SourceFacts};
use crate::domain::head::Head;
use shared_types::constants::ACCOUNT_MINIMUM_CURRENT_BASED_AMOUNT;

/// One dividend source per member when `head` creates a dividend (BR_G91).
pub fn dividend_sources(head: &Head, members: &[String]) -> Vec<SourceEntry> {
    let Some(amount) = head.new_dividend else {
        return Vec::new();
    };
    members
        .iter()
        .map(|pubkey| SourceEntry {
            op: Op::Create,
            identifier: pubkey.clone(),
            pos: head.number,
            tx: None,
            created_on: None,
            written_on: head.blockstamp(),
            written_time: head.median_time,
            locktime: 0,
            unlock: None,
            amount,
            base: head.unit_base,
            conditions: Some(format!("SIG({})", pubkey)),
            consumed: false,
            tx_index: None,
            facts: SourceFacts::default(),
        })
        .collect()
}

/// Net balance change per spending condition, in order of first appearance.
///
/// Created sources add their value, consumed sources subtract it. Entries
/// whose condition is unknown are skipped.
pub fn balance_variations(sindex: &[SourceEntry]) -> Vec<(String, i64)> {
    let mut variations: Vec<(String, i64)> = Vec::new();
    for entry in sindex {
        let Some(conditions) = &entry.conditions else {
            continue;
        };
        let delta = match entry.op {
            Op::Create => entry.value(),
            Op::Update => -entry.value(),
        };
        match variations.iter_mut().find(|(c, _)| c == conditions) {
            Some((_, total)) => *total += delta,
            None => variations.push((conditions.clone(), delta)),
        }
    }
    variations
}

/// `true` when a balance falls under the minimum kept for an account.
pub fn is_below_minimum(balance: i64, unit_base: u32) -> bool {
    balance < ACCOUNT_MINIMUM_CURRENT_BASED_AMOUNT.saturating_mul(10i64.saturating_pow(unit_base))
}

/// Turn the relative validity of a renewal into absolute dates (BR_G104).
pub fn anchor_membership(entry: &mut MembershipEntry, based_median_time: u64) {
    if let Some(expires_on) = entry.expires_on.as_mut() {
        *expires_on += based_median_time;
    }
    if let Some(revokes_on) = entry.revokes_on.as_mut() {
        *revokes_on += based_median_time;
    }
}

/// Turn the relative validity of a certification into an absolute date (BR_G105).
pub fn anchor_certification(entry: &mut CertificationEntry, based_median_time: u64) {
    if let Some(expires_on) = entry.expires_on.as_mut() {
        *expires_on += based_median_time;
    }
}
