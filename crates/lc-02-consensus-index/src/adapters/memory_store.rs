use crate::domain::{
    reduce_by, BlockIndex, CertificationEntry, Head, IdentityEntry, MembershipEntry, Reducible,
    SourceEntry, StoreError, StoreResult, Wallet,
};
use crate::ports::IndexStore;
use async_trait::async_trait;
use shared_types::{Block, Blockstamp};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct StoreState {
    blocks: Vec<Block>,
    side_blocks: Vec<Block>,
    /// Oldest first.
    heads: Vec<Head>,
    iindex: Vec<IdentityEntry>,
    mindex: Vec<MembershipEntry>,
    cindex: Vec<CertificationEntry>,
    sindex: Vec<SourceEntry>,
    wallets: HashMap<String, Wallet>,
}

/// In-memory index store for tests and chain replay.
///
/// Rows are kept in write order, so every query returns them chronologically.
/// Write failures can be injected to exercise rollback paths.
#[derive(Debug, Default)]
pub struct InMemoryIndexStore {
    state: RwLock<StoreState>,
    /// Number of writes still allowed before every write fails.
    writes_before_failure: parking_lot::Mutex<Option<usize>>,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `writes` more writes succeed, then fail every write.
    pub fn fail_after_writes(&self, writes: usize) {
        *self.writes_before_failure.lock() = Some(writes);
    }

    pub fn clear_failures(&self) {
        *self.writes_before_failure.lock() = None;
    }

    /// Side blocks kept so far.
    pub fn side_blocks(&self) -> StoreResult<Vec<Block>> {
        Ok(self.read()?.side_blocks.clone())
    }

    /// Every wallet, sorted by conditions.
    pub fn wallets(&self) -> StoreResult<Vec<Wallet>> {
        let mut wallets: Vec<Wallet> = self.read()?.wallets.values().cloned().collect();
        wallets.sort_by(|a, b| a.conditions.cmp(&b.conditions));
        Ok(wallets)
    }

    /// Total number of index rows.
    pub fn row_count(&self) -> StoreResult<usize> {
        let state = self.read()?;
        Ok(state.iindex.len() + state.mindex.len() + state.cindex.len() + state.sindex.len())
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, StoreState>> {
        self.state.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, StoreState>> {
        let mut budget = self.writes_before_failure.lock();
        match budget.as_mut() {
            Some(0) => return Err(StoreError::WriteFailed("injected failure".to_string())),
            Some(remaining) => *remaining -= 1,
            None => {}
        }
        self.state.write().map_err(|_| StoreError::LockPoisoned)
    }
}

fn distinct<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.filter(|k| seen.insert(*k))
        .map(str::to_string)
        .collect()
}

fn take_written_on<T>(rows: &mut Vec<T>, stamp: &Blockstamp, written_on: impl Fn(&T) -> &Blockstamp) -> Vec<T> {
    let (removed, kept): (Vec<T>, Vec<T>) = rows.drain(..).partition(|r| written_on(r) == stamp);
    *rows = kept;
    removed
}

/// Fold the rows written before `below` into one row per subject. Subjects
/// matching `obsolete` once folded, and untouched since, are dropped.
fn trim_rows<T, K>(
    rows: &mut Vec<T>,
    below: u64,
    key: impl Fn(&T) -> K,
    written: impl Fn(&T) -> u64,
    obsolete: impl Fn(&T) -> bool,
) where
    T: Reducible,
    K: Eq + Hash,
{
    let (old, recent): (Vec<T>, Vec<T>) = rows.drain(..).partition(|r| written(r) < below);
    let touched: HashSet<K> = recent.iter().map(&key).collect();
    let mut trimmed: Vec<T> = reduce_by(&old, &key)
        .into_iter()
        .filter(|r| !obsolete(r) || touched.contains(&key(r)))
        .collect();
    trimmed.extend(recent);
    *rows = trimmed;
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    async fn current_block(&self) -> StoreResult<Option<Block>> {
        Ok(self.read()?.blocks.last().cloned())
    }

    async fn block(&self, number: u64) -> StoreResult<Option<Block>> {
        Ok(self
            .read()?
            .blocks
            .iter()
            .rev()
            .find(|b| b.number == number)
            .cloned())
    }

    async fn save_block(&self, block: Block) -> StoreResult<()> {
        let mut state = self.write()?;
        let expected = state.blocks.last().map(|b| b.number + 1).unwrap_or(0);
        if block.number != expected {
            return Err(StoreError::Inconsistent(format!(
                "block #{} saved on top of #{}",
                block.number,
                expected.saturating_sub(1)
            )));
        }
        state
            .side_blocks
            .retain(|b| !(b.number == block.number && b.hash == block.hash));
        state.blocks.push(Block {
            fork: false,
            ..block
        });
        Ok(())
    }

    async fn pop_block(&self) -> StoreResult<Option<Block>> {
        Ok(self.write()?.blocks.pop())
    }

    async fn save_side_block(&self, block: Block) -> StoreResult<()> {
        self.write()?.side_blocks.push(Block { fork: true, ..block });
        Ok(())
    }

    async fn heads(&self, count: usize) -> StoreResult<Vec<Head>> {
        Ok(self.read()?.heads.iter().rev().take(count).cloned().collect())
    }

    async fn push_head(&self, head: Head) -> StoreResult<()> {
        self.write()?.heads.push(head);
        Ok(())
    }

    async fn pop_head(&self) -> StoreResult<Option<Head>> {
        Ok(self.write()?.heads.pop())
    }

    async fn trim_heads(&self, keep: usize) -> StoreResult<()> {
        let mut state = self.write()?;
        let excess = state.heads.len().saturating_sub(keep);
        state.heads.drain(..excess);
        Ok(())
    }

    async fn iindex_rows(&self, pubkey: &str) -> StoreResult<Vec<IdentityEntry>> {
        Ok(self
            .read()?
            .iindex
            .iter()
            .filter(|e| e.pubkey == pubkey)
            .cloned()
            .collect())
    }

    async fn iindex_rows_by_uid(&self, uid: &str) -> StoreResult<Vec<IdentityEntry>> {
        Ok(self
            .read()?
            .iindex
            .iter()
            .filter(|e| e.uid.as_deref() == Some(uid))
            .cloned()
            .collect())
    }

    async fn iindex_pubkeys(&self) -> StoreResult<Vec<String>> {
        Ok(distinct(self.read()?.iindex.iter().map(|e| e.pubkey.as_str())))
    }

    async fn mindex_rows(&self, pubkey: &str) -> StoreResult<Vec<MembershipEntry>> {
        Ok(self
            .read()?
            .mindex
            .iter()
            .filter(|e| e.pubkey == pubkey)
            .cloned()
            .collect())
    }

    async fn mindex_pubkeys(&self) -> StoreResult<Vec<String>> {
        Ok(distinct(self.read()?.mindex.iter().map(|e| e.pubkey.as_str())))
    }

    async fn cindex_rows_from(&self, issuer: &str) -> StoreResult<Vec<CertificationEntry>> {
        Ok(self
            .read()?
            .cindex
            .iter()
            .filter(|e| e.issuer == issuer)
            .cloned()
            .collect())
    }

    async fn cindex_rows_to(&self, receiver: &str) -> StoreResult<Vec<CertificationEntry>> {
        Ok(self
            .read()?
            .cindex
            .iter()
            .filter(|e| e.receiver == receiver)
            .cloned()
            .collect())
    }

    async fn cindex_issuers(&self) -> StoreResult<Vec<String>> {
        Ok(distinct(self.read()?.cindex.iter().map(|e| e.issuer.as_str())))
    }

    async fn sindex_rows(&self, identifier: &str, pos: u64) -> StoreResult<Vec<SourceEntry>> {
        Ok(self
            .read()?
            .sindex
            .iter()
            .filter(|e| e.identifier == identifier && e.pos == pos)
            .cloned()
            .collect())
    }

    async fn sindex_rows_by_conditions(&self, conditions: &str) -> StoreResult<Vec<SourceEntry>> {
        Ok(self
            .read()?
            .sindex
            .iter()
            .filter(|e| e.conditions.as_deref() == Some(conditions))
            .cloned()
            .collect())
    }

    async fn write_index(&self, index: &BlockIndex) -> StoreResult<()> {
        let mut state = self.write()?;
        state.iindex.extend(index.iindex.iter().cloned());
        state.mindex.extend(index.mindex.iter().cloned());
        state.cindex.extend(index.cindex.iter().cloned());
        state.sindex.extend(index.sindex.iter().cloned());
        Ok(())
    }

    async fn remove_entries_written_on(&self, stamp: &Blockstamp) -> StoreResult<BlockIndex> {
        let mut state = self.write()?;
        Ok(BlockIndex {
            iindex: take_written_on(&mut state.iindex, stamp, |e| &e.written_on),
            mindex: take_written_on(&mut state.mindex, stamp, |e| &e.written_on),
            cindex: take_written_on(&mut state.cindex, stamp, |e| &e.written_on),
            sindex: take_written_on(&mut state.sindex, stamp, |e| &e.written_on),
        })
    }

    async fn trim_indexes(&self, below: u64) -> StoreResult<()> {
        let mut state = self.write()?;
        trim_rows(
            &mut state.iindex,
            below,
            |e| e.pubkey.clone(),
            |e| e.written_on.number,
            |_| false,
        );
        trim_rows(
            &mut state.mindex,
            below,
            |e| e.pubkey.clone(),
            |e| e.written_on.number,
            |_| false,
        );
        trim_rows(
            &mut state.cindex,
            below,
            |e| (e.issuer.clone(), e.receiver.clone()),
            |e| e.written_on.number,
            |e| !e.is_valid(),
        );
        trim_rows(
            &mut state.sindex,
            below,
            |e| (e.identifier.clone(), e.pos),
            |e| e.written_on.number,
            |e| e.consumed,
        );
        Ok(())
    }

    async fn wallet(&self, conditions: &str) -> StoreResult<Option<Wallet>> {
        Ok(self.read()?.wallets.get(conditions).cloned())
    }

    async fn save_wallet(&self, wallet: Wallet) -> StoreResult<()> {
        self.write()?
            .wallets
            .insert(wallet.conditions.clone(), wallet);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Op, Patch, SourceFacts};

    fn stamp(n: u64) -> Blockstamp {
        Blockstamp::new(n, format!("{:04X}", n))
    }

    fn block(n: u64) -> Block {
        Block {
            number: n,
            hash: format!("{:04X}", n),
            ..Block::default()
        }
    }

    fn cert(issuer: &str, receiver: &str, n: u64, expired_on: u64) -> CertificationEntry {
        CertificationEntry {
            op: if expired_on == 0 { Op::Create } else { Op::Update },
            expires_on: Some(1_000),
            expired_on: Some(expired_on),
            ..CertificationEntry::update(issuer, receiver, 0, stamp(n))
        }
    }

    fn output(id: &str, n: u64, consumed: bool) -> SourceEntry {
        SourceEntry {
            op: if consumed { Op::Update } else { Op::Create },
            identifier: id.to_string(),
            pos: 0,
            tx: None,
            created_on: None,
            written_on: stamp(n),
            written_time: n,
            locktime: 0,
            unlock: None,
            amount: 10,
            base: 0,
            conditions: Some("SIG(A)".to_string()),
            consumed,
            tx_index: None,
            facts: SourceFacts::default(),
        }
    }

    #[tokio::test]
    async fn test_blocks_are_chained() {
        let store = InMemoryIndexStore::new();
        store.save_block(block(0)).await.unwrap();
        store.save_block(block(1)).await.unwrap();
        assert!(matches!(
            store.save_block(block(3)).await,
            Err(StoreError::Inconsistent(_))
        ));
        assert_eq!(store.current_block().await.unwrap().unwrap().number, 1);
        assert!(store.block_by_blockstamp(&stamp(1)).await.unwrap().is_some());
        assert!(store
            .block_by_blockstamp(&Blockstamp::new(1, "FFFF"))
            .await
            .unwrap()
            .is_none());

        let popped = store.pop_block().await.unwrap().unwrap();
        store.save_side_block(popped).await.unwrap();
        assert!(store.side_blocks().unwrap()[0].fork);
    }

    #[tokio::test]
    async fn test_heads_newest_first() {
        let store = InMemoryIndexStore::new();
        for n in 0..5 {
            store
                .push_head(Head {
                    number: n,
                    ..Head::default()
                })
                .await
                .unwrap();
        }
        let heads = store.heads(2).await.unwrap();
        assert_eq!(heads[0].number, 4);
        assert_eq!(heads[1].number, 3);
        assert_eq!(store.head(3).await.unwrap().unwrap().number, 2);
        assert!(store.head(0).await.unwrap().is_none());

        store.trim_heads(2).await.unwrap();
        assert_eq!(store.heads(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_members_and_kicks() {
        let store = InMemoryIndexStore::new();
        let mut index = BlockIndex::default();
        for pubkey in ["A", "B"] {
            index.push(IdentityEntry {
                op: Op::Create,
                uid: Some(pubkey.to_lowercase()),
                member: Some(true),
                ..IdentityEntry::update(pubkey, stamp(0))
            });
        }
        store.write_index(&index).await.unwrap();
        assert_eq!(store.members().await.unwrap(), vec!["A", "B"]);

        let kick = BlockIndex {
            iindex: vec![IdentityEntry {
                kick: Some(true),
                ..IdentityEntry::update("B", stamp(1))
            }],
            ..BlockIndex::default()
        };
        store.write_index(&kick).await.unwrap();
        assert_eq!(store.to_be_kicked().await.unwrap(), vec!["B"]);
        assert_eq!(store.iindex_rows_by_uid("a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_entries_written_on() {
        let store = InMemoryIndexStore::new();
        let first = BlockIndex {
            cindex: vec![cert("A", "B", 1, 0)],
            ..BlockIndex::default()
        };
        let second = BlockIndex {
            cindex: vec![cert("A", "B", 2, 50)],
            ..BlockIndex::default()
        };
        store.write_index(&first).await.unwrap();
        store.write_index(&second).await.unwrap();
        assert!(store.valid_links_from("A").await.unwrap().is_empty());

        let removed = store.remove_entries_written_on(&stamp(2)).await.unwrap();
        assert_eq!(removed.cindex.len(), 1);
        assert_eq!(store.valid_links_to("B").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expiry_queries() {
        let store = InMemoryIndexStore::new();
        let index = BlockIndex {
            mindex: vec![
                MembershipEntry {
                    op: Op::Create,
                    expires_on: Some(100),
                    revokes_on: Some(200),
                    ..MembershipEntry::update("A", stamp(0))
                },
                MembershipEntry {
                    op: Op::Create,
                    expires_on: Some(300),
                    revokes_on: Some(600),
                    ..MembershipEntry::update("B", stamp(0))
                },
            ],
            cindex: vec![cert("A", "B", 0, 0)],
            ..BlockIndex::default()
        };
        store.write_index(&index).await.unwrap();

        let expiring = store.expiring_memberships(150).await.unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].pubkey, "A");
        assert!(store.revocable_memberships(150).await.unwrap().is_empty());
        assert_eq!(store.revocable_memberships(200).await.unwrap().len(), 1);
        assert_eq!(store.expired_certifications(1_000).await.unwrap().len(), 1);
        assert!(store.expired_certifications(999).await.unwrap().is_empty());

        let expiry = BlockIndex {
            mindex: vec![MembershipEntry {
                expired_on: Patch::Set(150),
                ..MembershipEntry::update("A", stamp(1))
            }],
            ..BlockIndex::default()
        };
        store.write_index(&expiry).await.unwrap();
        assert!(store.expiring_memberships(150).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_available_sources() {
        let store = InMemoryIndexStore::new();
        let index = BlockIndex {
            sindex: vec![output("T1", 1, false), output("T2", 1, false)],
            ..BlockIndex::default()
        };
        store.write_index(&index).await.unwrap();
        let spend = BlockIndex {
            sindex: vec![output("T1", 2, true)],
            ..BlockIndex::default()
        };
        store.write_index(&spend).await.unwrap();

        let available = store.available_sources("SIG(A)").await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].identifier, "T2");
        assert!(store.source("T1", 0).await.unwrap().unwrap().consumed);
    }

    #[tokio::test]
    async fn test_trim_folds_old_rows() {
        let store = InMemoryIndexStore::new();
        for (n, rows) in [
            (1, vec![output("T1", 1, false), output("T2", 1, false)]),
            (2, vec![output("T1", 2, true)]),
            (5, vec![output("T2", 5, true)]),
        ] {
            store
                .write_index(&BlockIndex {
                    sindex: rows,
                    ..BlockIndex::default()
                })
                .await
                .unwrap();
        }
        store.trim_indexes(3).await.unwrap();
        // T1 is spent below the trim point and disappears; T2 keeps one folded row.
        assert!(store.sindex_rows("T1", 0).await.unwrap().is_empty());
        assert_eq!(store.sindex_rows("T2", 0).await.unwrap().len(), 2);
        assert!(store.source("T2", 0).await.unwrap().unwrap().consumed);
        assert_eq!(store.row_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let store = InMemoryIndexStore::new();
        store.fail_after_writes(1);
        store.save_wallet(Wallet::new("SIG(A)")).await.unwrap();
        assert!(matches!(
            store.save_wallet(Wallet::new("SIG(B)")).await,
            Err(StoreError::WriteFailed(_))
        ));
        assert!(store.wallet("SIG(A)").await.unwrap().is_some());
        store.clear_failures();
        store.save_wallet(Wallet::new("SIG(B)")).await.unwrap();
        assert_eq!(store.wallets().unwrap().len(), 2);
    }
}
