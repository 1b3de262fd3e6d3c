//! # Index Builder
//!
//! Pure translation of a block into its local index: the entries the block
//! literally declares, before any history is consulted.
//!
//! | Section        | Entries                                  |
//! |----------------|------------------------------------------|
//! | identity       | IINDEX CREATE                            |
//! | joiner (new)   | MINDEX CREATE                            |
//! | joiner (back)  | MINDEX UPDATE + IINDEX UPDATE            |
//! | active         | MINDEX UPDATE                            |
//! | leaver         | MINDEX UPDATE                            |
//! | revoked        | MINDEX UPDATE                            |
//! | excluded       | IINDEX UPDATE                            |
//! | certification  | CINDEX CREATE                            |
//! | tx input       | SINDEX UPDATE                            |
//! | tx output      | SINDEX CREATE                            |

use crate::domain::config::CurrencyParameters;
use crate::domain::entries::{
    BlockIndex, CertificationEntry, CertificationFacts, IdentityEntry, IdentityFacts,
    MembershipEntry, MembershipType, Op, Patch, SourceEntry, SourceFacts,
};
use shared_types::constants::REVOCATION_FACTOR;
use shared_types::{Block, Blockstamp, MembershipRecord, ParseResult, Transaction};

/// Build the local index of `block`.
///
/// Fails only on malformed inline records.
pub fn local_index(block: &Block, params: &CurrencyParameters) -> ParseResult<BlockIndex> {
    let written_on = block.blockstamp();
    let mut index = BlockIndex::default();

    for idty in block.parsed_identities()? {
        index.iindex.push(IdentityEntry {
            op: Op::Create,
            hash: Some(idty.hash()),
            pubkey: idty.pubkey,
            uid: Some(idty.uid),
            sig: Some(idty.sig),
            created_on: Some(idty.buid),
            written_on: written_on.clone(),
            member: Some(true),
            was_member: Some(true),
            kick: Some(false),
            wotb_id: None,
            facts: IdentityFacts::default(),
        });
    }

    for ms in block.parsed_joiners()? {
        let is_newcomer = index
            .iindex
            .iter()
            .any(|e| e.op == Op::Create && e.pubkey == ms.issuer);
        if is_newcomer {
            let mut entry = renewal(&ms, MembershipType::Join, block, params);
            entry.op = Op::Create;
            entry.leaving = Some(false);
            index.mindex.push(entry);
        } else {
            index
                .mindex
                .push(renewal(&ms, MembershipType::Join, block, params));
            index.iindex.push(IdentityEntry {
                member: Some(true),
                ..IdentityEntry::update(ms.issuer, written_on.clone())
            });
        }
    }

    for ms in block.parsed_actives()? {
        index
            .mindex
            .push(renewal(&ms, MembershipType::Active, block, params));
    }

    for ms in block.parsed_leavers()? {
        index.mindex.push(MembershipEntry {
            created_on: Some(ms.blockstamp),
            kind: Some(MembershipType::Leave),
            chainable_on: Some(block.median_time + params.ms_period),
            leaving: Some(true),
            ..MembershipEntry::update(ms.issuer, written_on.clone())
        });
    }

    for revocation in block.parsed_revoked()? {
        index.mindex.push(MembershipEntry {
            created_on: Some(written_on.clone()),
            revoked_on: Some(written_on.clone()),
            revocation: Some(revocation.revocation),
            chainable_on: Some(block.median_time + params.ms_period),
            leaving: Some(false),
            ..MembershipEntry::update(revocation.pubkey, written_on.clone())
        });
    }

    for excluded in &block.excluded {
        index.iindex.push(IdentityEntry {
            member: Some(false),
            kick: Some(false),
            ..IdentityEntry::update(excluded.clone(), written_on.clone())
        });
    }

    for cert in block.parsed_certifications()? {
        index.cindex.push(CertificationEntry {
            op: Op::Create,
            issuer: cert.issuer,
            receiver: cert.receiver,
            created_on: cert.block_number,
            written_on: written_on.clone(),
            sig: Some(cert.sig),
            chainable_on: Some(block.median_time + params.sig_period),
            expires_on: Some(params.sig_validity),
            expired_on: Some(0),
            facts: CertificationFacts::default(),
        });
    }

    for (tx_index, tx) in block.transactions.iter().enumerate() {
        index.sindex.extend(local_sources(block, tx, tx_index)?);
    }

    Ok(index)
}

/// `JOIN` or `ACTIVE` membership entry. Expiry dates are relative until the
/// based block is known. `leaving` is left untouched: a renewal does not
/// cancel an earlier leave.
fn renewal(
    ms: &MembershipRecord,
    kind: MembershipType,
    block: &Block,
    params: &CurrencyParameters,
) -> MembershipEntry {
    MembershipEntry {
        created_on: Some(ms.blockstamp.clone()),
        kind: Some(kind),
        expires_on: Some(params.ms_validity),
        expired_on: Patch::Clear,
        revokes_on: Some(params.ms_validity * REVOCATION_FACTOR),
        chainable_on: Some(block.median_time + params.ms_period),
        ..MembershipEntry::update(ms.issuer.clone(), block.blockstamp())
    }
}

/// Sources spent (UPDATE) and created (CREATE) by one transaction.
fn local_sources(block: &Block, tx: &Transaction, tx_index: usize) -> ParseResult<Vec<SourceEntry>> {
    let tx_hash = tx.hash();
    let created_on: Blockstamp = tx.blockstamp.parse()?;
    let written_on = block.blockstamp();
    let mut sources = Vec::with_capacity(tx.inputs.len() + tx.outputs.len());

    for (k, input) in tx.parsed_inputs()?.into_iter().enumerate() {
        sources.push(SourceEntry {
            op: Op::Update,
            identifier: input.identifier,
            pos: input.pos,
            tx: Some(tx_hash.clone()),
            created_on: Some(created_on.clone()),
            written_on: written_on.clone(),
            written_time: block.median_time,
            locktime: tx.locktime,
            unlock: tx.unlocks.get(k).cloned(),
            amount: input.amount,
            base: input.base,
            conditions: None,
            consumed: true,
            tx_index: Some(tx_index),
            facts: SourceFacts::default(),
        });
    }

    for (i, output) in tx.parsed_outputs()?.into_iter().enumerate() {
        sources.push(SourceEntry {
            op: Op::Create,
            identifier: tx_hash.clone(),
            pos: i as u64,
            tx: None,
            created_on: Some(created_on.clone()),
            written_on: written_on.clone(),
            written_time: block.median_time,
            locktime: 0,
            unlock: None,
            amount: output.amount,
            base: output.base,
            conditions: Some(output.conditions),
            consumed: false,
            tx_index: Some(tx_index),
            facts: SourceFacts::default(),
        });
    }

    Ok(sources)
}
