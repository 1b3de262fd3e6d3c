//! # Determinism
//!
//! Two nodes applying the same blocks agree on every HEAD, every index row and
//! the trust graph.

#[cfg(test)]
mod tests {
    use crate::fixtures::{create_reference_chain, create_service, snapshot, test_params};
    use lc_02_consensus_index::ports::BlockchainApi;
    use lc_02_consensus_index::IndexStore;

    #[tokio::test]
    async fn test_replicas_derive_identical_heads() {
        let (forge, members) = create_reference_chain(12).await;
        let params = test_params();
        let (first, first_store) = create_service(&params);
        let (second, second_store) = create_service(&params);

        for block in &forge.blocks {
            let a = first.apply_block(block.clone()).await.unwrap();
            let b = second.apply_block(block.clone()).await.unwrap();
            assert_eq!(a, b, "HEAD #{} differs", block.number);
        }

        assert_eq!(
            snapshot(&first, &first_store).await,
            snapshot(&second, &second_store).await
        );
        assert_eq!(
            snapshot(&first, &first_store).await,
            snapshot(&forge.service, &forge.store).await
        );
        for member in &members {
            assert_eq!(
                first_store.iindex_rows(&member.pubkey).await.unwrap(),
                second_store.iindex_rows(&member.pubkey).await.unwrap()
            );
            assert_eq!(
                first_store.mindex_rows(&member.pubkey).await.unwrap(),
                second_store.mindex_rows(&member.pubkey).await.unwrap()
            );
            assert_eq!(
                first_store.cindex_rows_from(&member.pubkey).await.unwrap(),
                second_store.cindex_rows_from(&member.pubkey).await.unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_check_is_repeatable_and_side_effect_free() {
        let (forge, _) = create_reference_chain(6).await;
        let params = test_params();
        let (service, store) = create_service(&params);
        let (last, history) = forge.blocks.split_last().unwrap();
        for block in history {
            service.apply_block(block.clone()).await.unwrap();
        }
        let before = snapshot(&service, &store).await;
        let rows = store.row_count().unwrap();

        let first = service.check_block(last).await.unwrap();
        let second = service.check_block(last).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(snapshot(&service, &store).await, before);
        assert_eq!(store.row_count().unwrap(), rows);
    }
}
