//! # Post-HEAD Generators
//!
//! Once a block passes the global rules, the protocol derives further entries
//! from the stored state: dividends, garbage collection of small accounts,
//! expiries, exclusions and implicit revocations. They are appended to the
//! block's index before it is written.
//!
//! ```text
//! G91 dividends ─→ G106 garbage ─→ G92 cert expiry ─→ G93 ms expiry
//!   ─→ G94 exclusion (ms) ─→ G95 exclusion (certs) ─→ G96 revocation
//!   ─→ G104/G105 absolute expiry dates
//! ```

use crate::domain::{
    anchor_certification, anchor_membership, balance_variations, dividend_sources,
    is_below_minimum, BlockIndex, CertificationEntry, ConsensusResult, CurrencyParameters, Head,
    IdentityEntry, MembershipEntry, Op, Patch, SourceEntry, SourceFacts, StoreError,
};
use crate::ports::IndexStore;
use tracing::debug;

/// Runs the post-HEAD generators against a store.
pub struct IndexGenerator<'a, S: ?Sized> {
    store: &'a S,
    params: &'a CurrencyParameters,
}

impl<'a, S: IndexStore + ?Sized> IndexGenerator<'a, S> {
    pub fn new(store: &'a S, params: &'a CurrencyParameters) -> Self {
        Self { store, params }
    }

    /// Append every generated entry of `head` to `index`.
    pub async fn generate(&self, head: &Head, index: &mut BlockIndex) -> ConsensusResult<()> {
        if head.new_dividend.is_some() {
            let members = self.store.members().await?;
            index.sindex.extend(dividend_sources(head, &members));
        }

        let garbage = self.garbage_small_accounts(head, &index.sindex).await?;
        index.sindex.extend(garbage);

        let cert_expiries = self.certification_expiries(head).await?;
        index.cindex.extend(cert_expiries);

        let ms_expiries = self.membership_expiries(head).await?;
        index.mindex.extend(ms_expiries);

        let ms_exclusions = self.exclusions_by_membership(head, &index.mindex).await?;
        index.iindex.extend(ms_exclusions);

        let cert_exclusions = self.exclusions_by_certifications(head, index).await?;
        index.iindex.extend(cert_exclusions);

        let revocations = self.implicit_revocations(head).await?;
        index.mindex.extend(revocations);

        self.correct_expiry_dates(head, index).await?;

        debug!(
            "[lc-02] Block #{} generated index: {} entries",
            head.number,
            index.len()
        );
        Ok(())
    }

    /// Consume every source of an account whose balance falls under the
    /// minimum (BR_G106).
    async fn garbage_small_accounts(
        &self,
        head: &Head,
        sindex: &[SourceEntry],
    ) -> ConsensusResult<Vec<SourceEntry>> {
        let mut garbage = Vec::new();
        for (conditions, variation) in balance_variations(sindex) {
            let balance = self
                .store
                .wallet(&conditions)
                .await?
                .map_or(0, |w| w.balance);
            if !is_below_minimum(balance + variation, head.unit_base) {
                continue;
            }

            let local = sindex
                .iter()
                .filter(|s| s.conditions.as_deref() == Some(conditions.as_str()))
                .cloned();
            let global = self.store.available_sources(&conditions).await?;
            for src in local.chain(global) {
                let being_consumed = sindex
                    .iter()
                    .any(|e| e.op == Op::Update && e.same_source(&src));
                if being_consumed {
                    continue;
                }
                garbage.push(SourceEntry {
                    op: Op::Update,
                    written_on: head.blockstamp(),
                    written_time: head.median_time,
                    consumed: true,
                    unlock: None,
                    tx_index: None,
                    facts: SourceFacts::default(),
                    ..src
                });
            }
        }
        if !garbage.is_empty() {
            debug!(
                "[lc-02] Block #{} collects {} small sources",
                head.number,
                garbage.len()
            );
        }
        Ok(garbage)
    }

    /// Valid certifications reaching their expiry date (BR_G92).
    async fn certification_expiries(&self, head: &Head) -> ConsensusResult<Vec<CertificationEntry>> {
        Ok(self
            .store
            .expired_certifications(head.median_time)
            .await?
            .into_iter()
            .map(|cert| CertificationEntry {
                expired_on: Some(head.median_time),
                ..CertificationEntry::update(
                    cert.issuer,
                    cert.receiver,
                    cert.created_on,
                    head.blockstamp(),
                )
            })
            .collect())
    }

    /// Memberships reaching their expiry date (BR_G93).
    async fn membership_expiries(&self, head: &Head) -> ConsensusResult<Vec<MembershipEntry>> {
        Ok(self
            .store
            .expiring_memberships(head.median_time)
            .await?
            .into_iter()
            .map(|ms| MembershipEntry {
                created_on: ms.created_on,
                expired_on: Patch::Set(head.median_time),
                ..MembershipEntry::update(ms.pubkey, head.blockstamp())
            })
            .collect())
    }

    /// Members whose membership just expired get flagged for exclusion (BR_G94).
    async fn exclusions_by_membership(
        &self,
        head: &Head,
        mindex: &[MembershipEntry],
    ) -> ConsensusResult<Vec<IdentityEntry>> {
        let mut exclusions = Vec::new();
        for ms in mindex.iter().filter(|m| m.expired_on.is_set()) {
            if self.store.is_member(&ms.pubkey).await? {
                exclusions.push(kick(&ms.pubkey, head));
            }
        }
        Ok(exclusions)
    }

    /// Members left with fewer than `sigQty` valid certifications get flagged
    /// for exclusion (BR_G95).
    async fn exclusions_by_certifications(
        &self,
        head: &Head,
        index: &BlockIndex,
    ) -> ConsensusResult<Vec<IdentityEntry>> {
        let mut exclusions: Vec<IdentityEntry> = Vec::new();
        let expired = index
            .cindex
            .iter()
            .filter(|c| c.expired_on.is_some_and(|t| t > 0));
        for cert in expired {
            let receiver = cert.receiver.as_str();
            if exclusions.iter().any(|e| e.pubkey == receiver) {
                continue;
            }
            let just_expired = index
                .cindex
                .iter()
                .filter(|c| c.receiver == receiver && c.expired_on.is_some_and(|t| t > 0))
                .count();
            let just_received = index
                .cindex
                .iter()
                .filter(|c| c.receiver == receiver && c.is_valid())
                .count();
            let valid = self.store.valid_links_to(receiver).await?.len();
            if (valid + just_received).saturating_sub(just_expired) as u64 >= self.params.sig_qty {
                continue;
            }
            let being_excluded = index
                .iindex
                .iter()
                .any(|i| i.member == Some(false) && i.pubkey == receiver);
            if !being_excluded && self.store.is_member(receiver).await? {
                exclusions.push(kick(receiver, head));
            }
        }
        Ok(exclusions)
    }

    /// Memberships reaching their revocation date without being revoked (BR_G96).
    async fn implicit_revocations(&self, head: &Head) -> ConsensusResult<Vec<MembershipEntry>> {
        Ok(self
            .store
            .revocable_memberships(head.median_time)
            .await?
            .into_iter()
            .map(|ms| MembershipEntry {
                created_on: ms.created_on,
                revoked_on: Some(head.blockstamp()),
                ..MembershipEntry::update(ms.pubkey, head.blockstamp())
            })
            .collect())
    }

    /// Turn relative validities into dates based on the referenced blocks
    /// (BR_G104, BR_G105).
    async fn correct_expiry_dates(&self, head: &Head, index: &mut BlockIndex) -> ConsensusResult<()> {
        for ms in index.mindex.iter_mut().filter(|m| m.is_renewal()) {
            let based = if head.number == 0 {
                head.median_time
            } else {
                let stamp = ms.created_on.as_ref().ok_or_else(|| {
                    StoreError::BlockNotFound(format!("membership base of {}", ms.pubkey))
                })?;
                self.store
                    .block_by_blockstamp(stamp)
                    .await?
                    .ok_or_else(|| StoreError::BlockNotFound(stamp.to_string()))?
                    .median_time
            };
            anchor_membership(ms, based);
        }

        for cert in index.cindex.iter_mut().filter(|c| c.op == Op::Create) {
            let based = if head.number == 0 {
                head.median_time
            } else {
                self.store
                    .block(cert.created_on)
                    .await?
                    .ok_or_else(|| StoreError::BlockNotFound(cert.created_on.to_string()))?
                    .median_time
            };
            anchor_certification(cert, based);
        }
        Ok(())
    }
}

fn kick(pubkey: &str, head: &Head) -> IdentityEntry {
    IdentityEntry {
        kick: Some(true),
        ..IdentityEntry::update(pubkey, head.blockstamp())
    }
}
