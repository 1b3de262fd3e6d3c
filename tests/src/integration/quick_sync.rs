//! # Quick Sync Equivalence
//!
//! Replaying a trusted chain through quick sync leaves the node in the same
//! state as applying every block with full checks.

#[cfg(test)]
mod tests {
    use crate::fixtures::{create_reference_chain, snapshot, test_params, Member};
    use lc_02_consensus_index::ports::BlockchainApi;
    use lc_02_consensus_index::{
        BlockchainDependencies, Ed25519Verifier, InMemoryIndexStore, InMemoryTransactionPool,
        IndexStore, QuickSync,
    };
    use std::sync::Arc;

    fn create_deps(
        store: &Arc<InMemoryIndexStore>,
    ) -> BlockchainDependencies<InMemoryIndexStore, Ed25519Verifier, InMemoryTransactionPool> {
        BlockchainDependencies {
            store: Arc::clone(store),
            verifier: Arc::new(Ed25519Verifier),
            pool: Arc::new(InMemoryTransactionPool::new()),
            params: test_params(),
        }
    }

    async fn assert_same_records(
        quick: &InMemoryIndexStore,
        full: &InMemoryIndexStore,
        members: &[Member],
    ) {
        for member in members {
            let key = &member.pubkey;
            assert_eq!(
                quick.iindex_reduced(key).await.unwrap(),
                full.iindex_reduced(key).await.unwrap(),
                "identity of {}",
                member.uid
            );
            assert_eq!(
                quick.mindex_reduced(key).await.unwrap(),
                full.mindex_reduced(key).await.unwrap(),
                "membership of {}",
                member.uid
            );
            assert_eq!(
                quick.valid_links_from(key).await.unwrap(),
                full.valid_links_from(key).await.unwrap(),
                "links of {}",
                member.uid
            );
            assert_eq!(
                quick.available_sources(&member.conditions()).await.unwrap(),
                full.available_sources(&member.conditions()).await.unwrap(),
                "sources of {}",
                member.uid
            );
        }
    }

    #[tokio::test]
    async fn test_quick_sync_matches_full_replay() {
        let (forge, members) = create_reference_chain(24).await;
        let store = Arc::new(InMemoryIndexStore::new());

        let service = QuickSync::new(create_deps(&store))
            .sync(forge.blocks.clone())
            .await
            .unwrap();

        assert_eq!(
            snapshot(&service, &store).await,
            snapshot(&forge.service, &forge.store).await
        );
        assert_same_records(&store, &forge.store, &members).await;
    }

    #[tokio::test]
    async fn test_small_buffer_flushes_often() {
        let (forge, members) = create_reference_chain(16).await;
        let store = Arc::new(InMemoryIndexStore::new());

        let service = QuickSync::new(create_deps(&store))
            .with_buffer_limit(1)
            .sync(forge.blocks.clone())
            .await
            .unwrap();

        assert_eq!(
            snapshot(&service, &store).await,
            snapshot(&forge.service, &forge.store).await
        );
        assert_same_records(&store, &forge.store, &members).await;
    }

    #[tokio::test]
    async fn test_synced_node_keeps_following_the_chain() {
        let (mut forge, _) = create_reference_chain(12).await;
        let store = Arc::new(InMemoryIndexStore::new());
        let service = QuickSync::new(create_deps(&store))
            .sync(forge.blocks.clone())
            .await
            .unwrap();

        let [alice, ..] = crate::fixtures::founders();
        forge.push_empty(&alice).await;
        let next = forge.blocks.last().unwrap().clone();
        let head = service.apply_block(next).await.unwrap();

        assert_eq!(Some(head), forge.service.current_head().await.unwrap());
        assert_eq!(service.revert_current().await.unwrap().number, 12);
    }

    #[tokio::test]
    async fn test_tampered_tail_is_refused() {
        let (forge, _) = create_reference_chain(10).await;
        let mut blocks = forge.blocks.clone();
        if let Some(last) = blocks.last_mut() {
            last.members_count += 1;
        }
        let store = Arc::new(InMemoryIndexStore::new());

        let result = QuickSync::new(create_deps(&store)).sync(blocks).await;

        let err = result.err().expect("tail is checked");
        assert_eq!(err.to_string(), "ruleMembersCount");
    }
}
