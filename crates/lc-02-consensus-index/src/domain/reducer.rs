//! # Reducer
//!
//! Folds the chronological rows of one subject into its current record: the
//! last value written for each field wins, absent values never overwrite.

use crate::domain::entries::{
    CertificationEntry, IdentityEntry, MembershipEntry, SourceEntry,
};
use std::collections::HashMap;
use std::hash::Hash;

/// A partial record that can be folded with a newer one.
pub trait Reducible: Clone {
    /// Apply the fields written by `newer` on top of `self`.
    fn merge(&mut self, newer: &Self);
}

fn merge_field<T: Clone>(field: &mut Option<T>, newer: &Option<T>) {
    if newer.is_some() {
        field.clone_from(newer);
    }
}

impl Reducible for IdentityEntry {
    fn merge(&mut self, newer: &Self) {
        self.op = newer.op;
        self.written_on.clone_from(&newer.written_on);
        merge_field(&mut self.uid, &newer.uid);
        merge_field(&mut self.hash, &newer.hash);
        merge_field(&mut self.sig, &newer.sig);
        merge_field(&mut self.created_on, &newer.created_on);
        merge_field(&mut self.member, &newer.member);
        merge_field(&mut self.was_member, &newer.was_member);
        merge_field(&mut self.kick, &newer.kick);
        merge_field(&mut self.wotb_id, &newer.wotb_id);
    }
}

impl Reducible for MembershipEntry {
    fn merge(&mut self, newer: &Self) {
        self.op = newer.op;
        self.written_on.clone_from(&newer.written_on);
        merge_field(&mut self.created_on, &newer.created_on);
        merge_field(&mut self.kind, &newer.kind);
        merge_field(&mut self.expires_on, &newer.expires_on);
        self.expired_on.merge(&newer.expired_on);
        merge_field(&mut self.revokes_on, &newer.revokes_on);
        merge_field(&mut self.revoked_on, &newer.revoked_on);
        merge_field(&mut self.revocation, &newer.revocation);
        merge_field(&mut self.chainable_on, &newer.chainable_on);
        merge_field(&mut self.leaving, &newer.leaving);
    }
}

impl Reducible for CertificationEntry {
    fn merge(&mut self, newer: &Self) {
        self.op = newer.op;
        self.written_on.clone_from(&newer.written_on);
        self.created_on = newer.created_on;
        merge_field(&mut self.sig, &newer.sig);
        merge_field(&mut self.chainable_on, &newer.chainable_on);
        merge_field(&mut self.expires_on, &newer.expires_on);
        merge_field(&mut self.expired_on, &newer.expired_on);
    }
}

impl Reducible for SourceEntry {
    fn merge(&mut self, newer: &Self) {
        self.op = newer.op;
        self.written_on.clone_from(&newer.written_on);
        self.written_time = newer.written_time;
        self.locktime = newer.locktime;
        self.amount = newer.amount;
        self.base = newer.base;
        self.consumed = newer.consumed;
        merge_field(&mut self.tx, &newer.tx);
        merge_field(&mut self.created_on, &newer.created_on);
        merge_field(&mut self.unlock, &newer.unlock);
        merge_field(&mut self.conditions, &newer.conditions);
    }
}

/// Current record of one subject, `None` when it has no rows.
pub fn reduce<T: Reducible>(rows: &[T]) -> Option<T> {
    let (first, rest) = rows.split_first()?;
    let mut reduced = first.clone();
    for row in rest {
        reduced.merge(row);
    }
    Some(reduced)
}

/// Current record of every subject found in `rows`, grouped by `key`.
///
/// Subjects come out in the order of their first row.
pub fn reduce_by<T, K, F>(rows: &[T], key: F) -> Vec<T>
where
    T: Reducible,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut reduced: Vec<T> = Vec::new();
    for row in rows {
        match positions.get(&key(row)) {
            Some(&i) => reduced[i].merge(row),
            None => {
                positions.insert(key(row), reduced.len());
                reduced.push(row.clone());
            }
        }
    }
    reduced
}
