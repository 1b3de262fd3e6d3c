//! Driven ports (Outbound dependencies)
//!
//! The store exposes raw, chronologically ordered index rows. Everything
//! derived from them (reduced records, members, expiries, available sources)
//! is computed by provided methods, so every adapter answers those queries
//! the same way.

use crate::domain::{
    reduce, reduce_by, BlockIndex, CertificationEntry, Head, IdentityEntry, MembershipEntry,
    SourceEntry, StoreResult, Wallet,
};
use async_trait::async_trait;
use shared_types::{Block, Blockstamp, Transaction};

/// Data access layer of the consensus index.
#[async_trait]
pub trait IndexStore: Send + Sync {
    // === BLOCKS ===

    async fn current_block(&self) -> StoreResult<Option<Block>>;

    /// Canonical block at `number`.
    async fn block(&self, number: u64) -> StoreResult<Option<Block>>;

    /// Append a block to the canonical chain.
    async fn save_block(&self, block: Block) -> StoreResult<()>;

    /// Remove the current canonical block.
    async fn pop_block(&self) -> StoreResult<Option<Block>>;

    /// Keep a block outside the canonical chain, flagged as fork.
    async fn save_side_block(&self, block: Block) -> StoreResult<()>;

    // === HEAD HISTORY ===

    /// Up to `count` HEADs, newest first.
    async fn heads(&self, count: usize) -> StoreResult<Vec<Head>>;

    async fn push_head(&self, head: Head) -> StoreResult<()>;

    async fn pop_head(&self) -> StoreResult<Option<Head>>;

    /// Keep only the `keep` newest HEADs.
    async fn trim_heads(&self, keep: usize) -> StoreResult<()>;

    // === RAW INDEX ROWS (chronological) ===

    async fn iindex_rows(&self, pubkey: &str) -> StoreResult<Vec<IdentityEntry>>;

    async fn iindex_rows_by_uid(&self, uid: &str) -> StoreResult<Vec<IdentityEntry>>;

    /// Every pubkey with identity rows, in order of first write.
    async fn iindex_pubkeys(&self) -> StoreResult<Vec<String>>;

    async fn mindex_rows(&self, pubkey: &str) -> StoreResult<Vec<MembershipEntry>>;

    /// Every pubkey with membership rows, in order of first write.
    async fn mindex_pubkeys(&self) -> StoreResult<Vec<String>>;

    async fn cindex_rows_from(&self, issuer: &str) -> StoreResult<Vec<CertificationEntry>>;

    async fn cindex_rows_to(&self, receiver: &str) -> StoreResult<Vec<CertificationEntry>>;

    /// Every certification issuer, in order of first write.
    async fn cindex_issuers(&self) -> StoreResult<Vec<String>>;

    async fn sindex_rows(&self, identifier: &str, pos: u64) -> StoreResult<Vec<SourceEntry>>;

    async fn sindex_rows_by_conditions(&self, conditions: &str) -> StoreResult<Vec<SourceEntry>>;

    // === WRITES ===

    /// Append the entries of one block. Each index is written as one batch.
    async fn write_index(&self, index: &BlockIndex) -> StoreResult<()>;

    /// Remove and return every entry written at `stamp`.
    async fn remove_entries_written_on(&self, stamp: &Blockstamp) -> StoreResult<BlockIndex>;

    /// Fold the history written before block `below` into reduced rows.
    async fn trim_indexes(&self, below: u64) -> StoreResult<()>;

    // === WALLETS ===

    async fn wallet(&self, conditions: &str) -> StoreResult<Option<Wallet>>;

    async fn save_wallet(&self, wallet: Wallet) -> StoreResult<()>;

    // === DERIVED QUERIES ===

    async fn block_by_blockstamp(&self, stamp: &Blockstamp) -> StoreResult<Option<Block>> {
        Ok(self
            .block(stamp.number)
            .await?
            .filter(|block| block.hash == stamp.hash))
    }

    async fn current_head(&self) -> StoreResult<Option<Head>> {
        Ok(self.heads(1).await?.into_iter().next())
    }

    /// `n`-th HEAD back in history, `1` being the current one.
    async fn head(&self, n: usize) -> StoreResult<Option<Head>> {
        if n == 0 {
            return Ok(None);
        }
        Ok(self.heads(n).await?.into_iter().nth(n - 1))
    }

    async fn iindex_reduced(&self, pubkey: &str) -> StoreResult<Option<IdentityEntry>> {
        Ok(reduce(&self.iindex_rows(pubkey).await?))
    }

    async fn mindex_reduced(&self, pubkey: &str) -> StoreResult<Option<MembershipEntry>> {
        Ok(reduce(&self.mindex_rows(pubkey).await?))
    }

    async fn cindex_reduced(
        &self,
        issuer: &str,
        receiver: &str,
    ) -> StoreResult<Option<CertificationEntry>> {
        let rows: Vec<CertificationEntry> = self
            .cindex_rows_from(issuer)
            .await?
            .into_iter()
            .filter(|c| c.receiver == receiver)
            .collect();
        Ok(reduce(&rows))
    }

    async fn is_member(&self, pubkey: &str) -> StoreResult<bool> {
        Ok(self
            .iindex_reduced(pubkey)
            .await?
            .is_some_and(|idty| idty.is_member()))
    }

    /// Current members, in order of first identity write.
    async fn members(&self) -> StoreResult<Vec<String>> {
        let mut members = Vec::new();
        for pubkey in self.iindex_pubkeys().await? {
            if self.is_member(&pubkey).await? {
                members.push(pubkey);
            }
        }
        Ok(members)
    }

    /// Identities flagged for exclusion.
    async fn to_be_kicked(&self) -> StoreResult<Vec<String>> {
        let mut kicked = Vec::new();
        for pubkey in self.iindex_pubkeys().await? {
            let flagged = self
                .iindex_reduced(&pubkey)
                .await?
                .is_some_and(|idty| idty.kick == Some(true));
            if flagged {
                kicked.push(pubkey);
            }
        }
        Ok(kicked)
    }

    async fn valid_links_from(&self, issuer: &str) -> StoreResult<Vec<CertificationEntry>> {
        let rows = self.cindex_rows_from(issuer).await?;
        Ok(reduce_by(&rows, |c| c.receiver.clone())
            .into_iter()
            .filter(CertificationEntry::is_valid)
            .collect())
    }

    async fn valid_links_to(&self, receiver: &str) -> StoreResult<Vec<CertificationEntry>> {
        let rows = self.cindex_rows_to(receiver).await?;
        Ok(reduce_by(&rows, |c| c.issuer.clone())
            .into_iter()
            .filter(CertificationEntry::is_valid)
            .collect())
    }

    /// Valid certifications whose expiry date is reached.
    async fn expired_certifications(
        &self,
        median_time: u64,
    ) -> StoreResult<Vec<CertificationEntry>> {
        let mut expired = Vec::new();
        for issuer in self.cindex_issuers().await? {
            expired.extend(
                self.valid_links_from(&issuer)
                    .await?
                    .into_iter()
                    .filter(|c| c.expires_on.is_some_and(|t| t <= median_time)),
            );
        }
        Ok(expired)
    }

    /// Memberships whose expiry date is reached and not yet recorded.
    async fn expiring_memberships(&self, median_time: u64) -> StoreResult<Vec<MembershipEntry>> {
        let mut expiring = Vec::new();
        for pubkey in self.mindex_pubkeys().await? {
            if let Some(ms) = self.mindex_reduced(&pubkey).await? {
                if ms.expires_on.is_some_and(|t| t <= median_time) && !ms.expired_on.is_set() {
                    expiring.push(ms);
                }
            }
        }
        Ok(expiring)
    }

    /// Memberships whose revocation date is reached and not yet revoked.
    async fn revocable_memberships(&self, median_time: u64) -> StoreResult<Vec<MembershipEntry>> {
        let mut revocable = Vec::new();
        for pubkey in self.mindex_pubkeys().await? {
            if let Some(ms) = self.mindex_reduced(&pubkey).await? {
                if ms.revokes_on.is_some_and(|t| t <= median_time) && ms.revoked_on.is_none() {
                    revocable.push(ms);
                }
            }
        }
        Ok(revocable)
    }

    async fn source(&self, identifier: &str, pos: u64) -> StoreResult<Option<SourceEntry>> {
        Ok(reduce(&self.sindex_rows(identifier, pos).await?))
    }

    /// Unconsumed sources locked by `conditions`.
    async fn available_sources(&self, conditions: &str) -> StoreResult<Vec<SourceEntry>> {
        let rows = self.sindex_rows_by_conditions(conditions).await?;
        Ok(reduce_by(&rows, |s| (s.identifier.clone(), s.pos))
            .into_iter()
            .filter(|s| !s.consumed)
            .collect())
    }
}

/// Signature verification of canonical documents.
pub trait SignatureVerifier: Send + Sync {
    /// `signature` and `pubkey` use their wire encodings.
    fn verify(&self, message: &str, signature: &str, pubkey: &str) -> bool;
}

/// Pool of pending transactions.
#[async_trait]
pub trait TransactionPool: Send + Sync {
    /// Drop transactions written in a block.
    async fn remove_included(&self, hashes: Vec<String>) -> Result<(), String>;

    /// Put back transactions of a reverted block.
    async fn readmit(&self, transactions: Vec<Transaction>) -> Result<(), String>;
}
