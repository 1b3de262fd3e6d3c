//! # Scope Completer
//!
//! Attaches to a local index everything the global rules look at: the HEAD of
//! the block and the derived facts of every entry. All reads go through
//! [`IndexStore`], so live validation and quick sync share this code; quick
//! sync only swaps the store for a buffered one.
//!
//! The distance check is the only step touching the trust graph. It runs on a
//! private copy, under a read guard taken after the last store access.

use crate::domain::{
    derive_head, history_depth, reduce, source_unlocks, BlockIndex, CertificationEntry,
    CertificationFacts, ConsensusResult, CurrencyParameters, Head, IdentityEntry, IdentityFacts,
    MembershipEntry, MembershipFacts, MembershipType, Op, RuleContext, SourceEntry, SourceFacts,
    UnlockProofs,
};
use crate::ports::{IndexStore, SignatureVerifier};
use lc_01_web_of_trust::{GraphExtension, NodeRef, TrustGraph, WotDistanceChecker};
use parking_lot::RwLock;
use shared_crypto::sha256_hex;
use shared_types::constants::{MEMBERSHIP_PERIOD_ACTIVATION_TIME, SPECIAL_HASH, TX_WINDOW};
use shared_types::documents::{certification_raw, revocation_raw, IdentityRef};
use shared_types::{Block, Blockstamp, TxUnlock, UnlockParam};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A local index with its HEAD and facts, ready for the global rules.
#[derive(Debug, Clone)]
pub struct CompletedBlock {
    pub head: Head,
    pub head_1: Option<Head>,
    pub index: BlockIndex,
    /// Identities flagged for exclusion before this block.
    pub to_be_kicked: Vec<String>,
}

impl CompletedBlock {
    pub fn rule_context<'a>(
        &'a self,
        block: &'a Block,
        params: &'a CurrencyParameters,
    ) -> RuleContext<'a> {
        RuleContext {
            block,
            head: &self.head,
            head_1: self.head_1.as_ref(),
            index: &self.index,
            params,
            to_be_kicked: &self.to_be_kicked,
        }
    }
}

/// What every derivation of one block reads.
#[derive(Clone, Copy)]
struct Scope<'a> {
    block: &'a Block,
    head: &'a Head,
    head_1: Option<&'a Head>,
}

impl Scope<'_> {
    fn median_time_1(&self) -> u64 {
        self.head_1.map_or(0, |h| h.median_time)
    }
}

/// Identity fields signed documents refer to.
struct KnownIdentity {
    pubkey: String,
    uid: String,
    buid: String,
    sig: String,
}

impl KnownIdentity {
    fn document_ref(&self) -> IdentityRef<'_> {
        IdentityRef {
            pubkey: &self.pubkey,
            uid: &self.uid,
            buid: &self.buid,
            sig: &self.sig,
        }
    }
}

/// HEAD of `block` on top of the history held by `store`, with `HEAD~1`.
pub async fn stored_head<S: IndexStore + ?Sized>(
    store: &S,
    block: &Block,
    index: &BlockIndex,
    params: &CurrencyParameters,
) -> ConsensusResult<(Head, Option<Head>)> {
    let head_1 = store.current_head().await?;
    let history = match &head_1 {
        None => Vec::new(),
        Some(h) => store.heads(history_depth(Some(h), params) + 1).await?,
    };
    let mut head = derive_head(block, params, &index.iindex, &history);

    head.issuer_is_member = if head.number == 0 {
        let rows: Vec<IdentityEntry> = index
            .iindex
            .iter()
            .filter(|e| e.pubkey == head.issuer)
            .cloned()
            .collect();
        reduce(&rows).is_some_and(|e| e.is_member())
    } else {
        store.is_member(&head.issuer).await?
    };

    debug!(
        "[lc-02] HEAD #{} derived: medianTime {}, membersCount {}",
        head.number, head.median_time, head.members_count
    );
    Ok((head, head_1))
}

/// Completes local indexes against a store and the trust graph.
pub struct ScopeCompleter<'a, S: ?Sized, V: ?Sized> {
    store: &'a S,
    verifier: &'a V,
    graph: &'a RwLock<TrustGraph>,
    params: &'a CurrencyParameters,
}

impl<'a, S, V> ScopeCompleter<'a, S, V>
where
    S: IndexStore + ?Sized,
    V: SignatureVerifier + ?Sized,
{
    pub fn new(
        store: &'a S,
        verifier: &'a V,
        graph: &'a RwLock<TrustGraph>,
        params: &'a CurrencyParameters,
    ) -> Self {
        Self {
            store,
            verifier,
            graph,
            params,
        }
    }

    /// HEAD of `block` on top of the stored history, with `HEAD~1`.
    pub async fn head(
        &self,
        block: &Block,
        index: &BlockIndex,
    ) -> ConsensusResult<(Head, Option<Head>)> {
        stored_head(self.store, block, index, self.params).await
    }

    /// Derive the HEAD and every entry fact of `block`.
    pub async fn complete(
        &self,
        block: &Block,
        mut index: BlockIndex,
    ) -> ConsensusResult<CompletedBlock> {
        let (head, head_1) = self.head(block, &index).await?;
        let scope = Scope {
            block,
            head: &head,
            head_1: head_1.as_ref(),
        };

        let outdistanced = self.is_any_outdistanced(scope, &index).await?;
        let BlockIndex {
            iindex,
            mindex,
            cindex,
            sindex,
        } = &mut index;
        self.identity_facts(scope, iindex, mindex).await?;
        self.membership_facts(scope, mindex, cindex, outdistanced)
            .await?;
        self.certification_facts(scope, cindex, iindex).await?;
        self.source_facts(scope, sindex).await?;

        let to_be_kicked = self.store.to_be_kicked().await?;
        Ok(CompletedBlock {
            head,
            head_1,
            index,
            to_be_kicked,
        })
    }

    // === AGES ===

    /// Seconds between a referenced block and `HEAD~1`.
    ///
    /// `window + 1` when the reference is not a canonical block, `0` for the
    /// special blockstamp at genesis.
    async fn blockstamp_age(
        &self,
        scope: Scope<'_>,
        stamp: Option<&Blockstamp>,
        window: u64,
    ) -> ConsensusResult<u64> {
        let Some(stamp) = stamp else {
            return Ok(window + 1);
        };
        if scope.head.number == 0 && stamp.is_special() {
            return Ok(0);
        }
        Ok(match self.store.block_by_blockstamp(stamp).await? {
            Some(reference) => scope.median_time_1().saturating_sub(reference.median_time),
            None => window + 1,
        })
    }

    // === IDENTITIES ===

    async fn identity_facts(
        &self,
        scope: Scope<'_>,
        iindex: &mut [IdentityEntry],
        mindex: &[MembershipEntry],
    ) -> ConsensusResult<()> {
        for entry in iindex.iter_mut() {
            let reduced = self.store.iindex_reduced(&entry.pubkey).await?;
            let mut facts = IdentityFacts {
                uid_unique: true,
                pub_unique: true,
                excluded_is_member: true,
                ..IdentityFacts::default()
            };

            if entry.op == Op::Create {
                facts.age = self
                    .blockstamp_age(scope, entry.created_on.as_ref(), self.params.idty_window)
                    .await?;
                if let Some(uid) = &entry.uid {
                    facts.uid_unique = self.store.iindex_rows_by_uid(uid).await?.is_empty();
                }
                facts.pub_unique = reduced.is_none();
            }

            if entry.member == Some(false) {
                facts.excluded_is_member = reduced.as_ref().is_some_and(IdentityEntry::is_member);
                facts.is_being_kicked = true;
            }

            let marked = reduced.as_ref().is_some_and(|r| r.kick == Some(true));
            let being_revoked = mindex
                .iter()
                .filter(|m| m.revoked_on.is_some() && m.pubkey == entry.pubkey)
                .count()
                == 1;
            facts.has_to_be_excluded = marked || being_revoked;

            entry.facts = facts;
        }
        Ok(())
    }

    // === MEMBERSHIPS ===

    /// `true` when a non-revoked membership of the block would be outdistanced
    /// once the block's newcomers and certifications are in the graph.
    async fn is_any_outdistanced(
        &self,
        scope: Scope<'_>,
        index: &BlockIndex,
    ) -> ConsensusResult<bool> {
        let candidates: Vec<&str> = index
            .mindex
            .iter()
            .filter(|e| e.revoked_on.is_none())
            .map(|e| e.pubkey.as_str())
            .collect();
        if candidates.is_empty() {
            return Ok(false);
        }

        let newcomers: Vec<&str> = index.newcomers().map(|e| e.pubkey.as_str()).collect();
        let mut nodes: HashMap<&str, NodeRef> = newcomers
            .iter()
            .enumerate()
            .map(|(i, pubkey)| (*pubkey, NodeRef::Newcomer(i)))
            .collect();
        let involved: Vec<&str> = candidates
            .iter()
            .copied()
            .chain(
                index
                    .cindex
                    .iter()
                    .flat_map(|c| [c.issuer.as_str(), c.receiver.as_str()]),
            )
            .collect();
        for pubkey in involved {
            if nodes.contains_key(pubkey) {
                continue;
            }
            let wotb_id = self
                .store
                .iindex_reduced(pubkey)
                .await?
                .and_then(|e| e.wotb_id);
            if let Some(id) = wotb_id {
                nodes.insert(pubkey, NodeRef::Existing(id));
            }
        }

        let Some(candidates) = candidates
            .iter()
            .map(|pubkey| nodes.get(pubkey).copied())
            .collect::<Option<Vec<NodeRef>>>()
        else {
            return Ok(true);
        };
        let extension = GraphExtension {
            newcomers: newcomers.len(),
            links: index
                .cindex
                .iter()
                .filter_map(|c| {
                    Some((
                        *nodes.get(c.issuer.as_str())?,
                        *nodes.get(c.receiver.as_str())?,
                    ))
                })
                .collect(),
        };

        let members_count = scope.head_1.map_or(0, |h| h.members_count);
        let graph = self.graph.read();
        let checker = WotDistanceChecker::new(
            &graph,
            members_count,
            self.params.step_max,
            self.params.x_percent,
            self.params.sig_stock as usize,
        );
        Ok(checker.is_any_outdistanced(&candidates, &extension)?)
    }

    async fn membership_facts(
        &self,
        scope: Scope<'_>,
        mindex: &mut [MembershipEntry],
        cindex: &[CertificationEntry],
        outdistanced: bool,
    ) -> ConsensusResult<()> {
        let period_active =
            scope.head.number > 0 && scope.head.median_time >= MEMBERSHIP_PERIOD_ACTIVATION_TIME;

        for entry in mindex.iter_mut() {
            let reduced = self.store.mindex_reduced(&entry.pubkey).await?;
            let is_member = self.store.is_member(&entry.pubkey).await?;
            let revoked = entry.revoked_on.is_some();
            let mut facts = MembershipFacts {
                number_following: true,
                distance_ok: true,
                enough_certs: true,
                leaver_is_member: true,
                active_is_member: true,
                revoked_is_member: true,
                revocation_sig_ok: true,
                is_being_revoked: revoked,
                ..MembershipFacts::default()
            };

            if !revoked {
                facts.age = self
                    .blockstamp_age(scope, entry.created_on.as_ref(), self.params.ms_window)
                    .await?;
                let previous = reduced.as_ref().and_then(|r| r.created_on.as_ref());
                if let (Some(created_on), Some(previous)) = (&entry.created_on, previous) {
                    facts.number_following = created_on.number > previous.number;
                }
            }

            if period_active {
                let median_time_1 = scope.median_time_1();
                facts.unchainables = self
                    .store
                    .mindex_rows(&entry.pubkey)
                    .await?
                    .iter()
                    .filter(|r| r.chainable_on.is_some_and(|t| t > median_time_1))
                    .count() as u64;
            }

            if entry.expires_on.is_some() {
                facts.distance_ok = !outdistanced;
            }
            facts.on_revoked = reduced.as_ref().is_some_and(|r| r.revoked_on.is_some());

            if entry.op == Op::Update && entry.kind == Some(MembershipType::Join) {
                facts.joins_twice = is_member;
            }
            if entry.is_renewal() {
                let existing = self.store.valid_links_to(&entry.pubkey).await?.len();
                let pending = cindex
                    .iter()
                    .filter(|c| c.receiver == entry.pubkey && c.is_valid())
                    .count();
                facts.enough_certs = (existing + pending) as u64 >= self.params.sig_qty;
            }
            match entry.kind {
                Some(MembershipType::Leave) => facts.leaver_is_member = is_member,
                Some(MembershipType::Active) => facts.active_is_member = is_member,
                _ => {}
            }

            if revoked {
                facts.revoked_is_member = is_member;
                facts.already_revoked = facts.on_revoked;
                facts.revocation_sig_ok = self.revocation_signature_ok(entry).await?;
            }

            entry.facts = facts;
        }
        Ok(())
    }

    async fn revocation_signature_ok(&self, entry: &MembershipEntry) -> ConsensusResult<bool> {
        let Some(revocation) = &entry.revocation else {
            return Ok(false);
        };
        let Some(idty) = self.written_identity(&entry.pubkey).await? else {
            return Ok(false);
        };
        let raw = revocation_raw(&self.params.currency, &idty.document_ref());
        Ok(self.verifier.verify(&raw, revocation, &entry.pubkey))
    }

    // === CERTIFICATIONS ===

    async fn certification_facts(
        &self,
        scope: Scope<'_>,
        cindex: &mut [CertificationEntry],
        iindex: &[IdentityEntry],
    ) -> ConsensusResult<()> {
        let median_time_1 = scope.median_time_1();

        for entry in cindex.iter_mut() {
            let mut facts = CertificationFacts::default();

            if scope.head.number > 0 {
                facts.age = match self.store.block(entry.created_on).await? {
                    Some(reference) => median_time_1.saturating_sub(reference.median_time),
                    None => self.params.sig_window + 1,
                };
                facts.unchainables = self
                    .store
                    .cindex_rows_from(&entry.issuer)
                    .await?
                    .iter()
                    .filter(|r| r.chainable_on.is_some_and(|t| t > median_time_1))
                    .count() as u64;
            }

            facts.stock = self.store.valid_links_from(&entry.issuer).await?.len() as u64;
            facts.from_member = self.store.is_member(&entry.issuer).await?;
            facts.to_member = self.store.is_member(&entry.receiver).await?;
            facts.to_newcomer = iindex
                .iter()
                .any(|i| i.member == Some(true) && i.pubkey == entry.receiver);
            facts.to_leaver = self
                .store
                .mindex_reduced(&entry.receiver)
                .await?
                .is_some_and(|m| m.leaving == Some(true));
            facts.is_replay = self
                .store
                .cindex_reduced(&entry.issuer, &entry.receiver)
                .await?
                .is_some_and(|c| c.is_valid());
            facts.sig_ok = self.certification_signature_ok(scope, entry).await?;

            entry.facts = facts;
        }
        Ok(())
    }

    async fn certification_signature_ok(
        &self,
        scope: Scope<'_>,
        cert: &CertificationEntry,
    ) -> ConsensusResult<bool> {
        let Some(sig) = &cert.sig else {
            return Ok(false);
        };
        let based_hash = if scope.head.number == 0 {
            if cert.created_on != 0 {
                return Ok(false);
            }
            SPECIAL_HASH.to_string()
        } else {
            let Some(based) = self.store.block(cert.created_on).await? else {
                return Ok(false);
            };
            let expired = scope
                .head_1
                .is_some_and(|h| h.median_time > based.median_time + self.params.sig_validity);
            if expired {
                return Ok(false);
            }
            based.hash
        };

        let idty = match scope.block.inline_identity(&cert.receiver)? {
            Some(inline) => Some(KnownIdentity {
                pubkey: inline.pubkey,
                uid: inline.uid,
                buid: inline.buid.to_string(),
                sig: inline.sig,
            }),
            None => self.written_identity(&cert.receiver).await?,
        };
        let Some(idty) = idty else {
            return Ok(false);
        };
        if idty.pubkey == cert.issuer {
            return Ok(false);
        }

        let cert_buid = format!("{}-{}", cert.created_on, based_hash);
        let raw = certification_raw(
            &self.params.currency,
            &cert.issuer,
            &idty.document_ref(),
            &cert_buid,
        );
        Ok(self.verifier.verify(&raw, sig, &cert.issuer))
    }

    async fn written_identity(&self, pubkey: &str) -> ConsensusResult<Option<KnownIdentity>> {
        let Some(idty) = self.store.iindex_reduced(pubkey).await? else {
            return Ok(None);
        };
        Ok(match (idty.uid, idty.created_on, idty.sig) {
            (Some(uid), Some(buid), Some(sig)) => Some(KnownIdentity {
                pubkey: idty.pubkey,
                uid,
                buid: buid.to_string(),
                sig,
            }),
            _ => None,
        })
    }

    // === SOURCES ===

    async fn source_facts(
        &self,
        scope: Scope<'_>,
        sindex: &mut [SourceEntry],
    ) -> ConsensusResult<()> {
        let signed = signature_results(scope.block, self.verifier);
        let local_outputs: Vec<SourceEntry> = sindex
            .iter()
            .filter(|e| e.op == Op::Create)
            .cloned()
            .collect();
        let mut spent: HashSet<(String, u64)> = HashSet::new();

        for entry in sindex.iter_mut().filter(|e| e.op == Op::Update) {
            let mut facts = SourceFacts {
                age: self
                    .blockstamp_age(scope, entry.created_on.as_ref(), TX_WINDOW)
                    .await?,
                ..SourceFacts::default()
            };

            // Only a written source is available: outputs of the same block
            // can lock or unlock an input, never fund it.
            let stored = self.store.source(&entry.identifier, entry.pos).await?;
            let first_spend = spent.insert((entry.identifier.clone(), entry.pos));
            facts.available = first_spend
                && stored.as_ref().is_some_and(|source| {
                    !source.consumed && source.amount == entry.amount && source.base == entry.base
                });

            let local = local_outputs.iter().find(|s| s.same_source(entry));
            match local.or(stored.as_ref()) {
                Some(source) => {
                    entry.conditions.clone_from(&source.conditions);
                    let unlocked = match (
                        &source.conditions,
                        unlock_proofs(scope, entry, source, &signed),
                    ) {
                        (Some(conditions), Some(proofs)) => source_unlocks(conditions, &proofs),
                        _ => false,
                    };
                    facts.is_locked = !unlocked;
                    facts.is_time_locked =
                        entry.written_time.saturating_sub(source.written_time) < entry.locktime;
                }
                None => facts.is_locked = true,
            }

            entry.facts = facts;
        }
        Ok(())
    }
}

/// Per transaction, per issuer: does the issuer's signature verify.
fn signature_results<V: SignatureVerifier + ?Sized>(block: &Block, verifier: &V) -> Vec<Vec<bool>> {
    block
        .transactions
        .iter()
        .map(|tx| {
            let raw = tx.raw_without_signatures();
            tx.issuers
                .iter()
                .enumerate()
                .map(|(i, issuer)| {
                    tx.signatures
                        .get(i)
                        .is_some_and(|sig| verifier.verify(&raw, sig, issuer))
                })
                .collect()
        })
        .collect()
}

/// Proofs an input offers for `source`. `None` when the unlock line is
/// missing, malformed, or references an unknown issuer.
fn unlock_proofs(
    scope: Scope<'_>,
    input: &SourceEntry,
    source: &SourceEntry,
    signed: &[Vec<bool>],
) -> Option<UnlockProofs> {
    let tx_index = input.tx_index?;
    let tx = scope.block.transactions.get(tx_index)?;
    let tx_signed = signed.get(tx_index)?;
    let unlock: TxUnlock = input.unlock.as_deref()?.parse().ok()?;

    let mut proofs = UnlockProofs {
        elapsed: scope.head.median_time.saturating_sub(source.written_time),
        current_time: scope.head.median_time,
        ..UnlockProofs::default()
    };
    for param in unlock.params {
        match param {
            UnlockParam::Sig(i) => {
                let issuer = tx.issuers.get(i)?;
                if tx_signed.get(i).copied().unwrap_or(false) {
                    proofs.signers.push(issuer.clone());
                }
            }
            UnlockParam::Xhx(preimage) => {
                proofs.preimage_hashes.push(sha256_hex(preimage.as_bytes()))
            }
        }
    }
    Some(proofs)
}
