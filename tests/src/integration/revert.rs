//! # Revert Inverse Law
//!
//! Reverting the block just applied restores HEAD, members, balances, index
//! rows and the trust graph.

#[cfg(test)]
mod tests {
    use crate::fixtures::{create_reference_chain, create_service, snapshot, test_params};
    use lc_02_consensus_index::ports::BlockchainApi;
    use lc_02_consensus_index::ConsensusError;

    #[tokio::test]
    async fn test_revert_undoes_each_block() {
        let (forge, _) = create_reference_chain(8).await;
        let (service, store) = create_service(&test_params());

        let mut before = Vec::new();
        for block in &forge.blocks {
            before.push((snapshot(&service, &store).await, store.row_count().unwrap()));
            service.apply_block(block.clone()).await.unwrap();
        }

        for block in forge.blocks.iter().rev() {
            let reverted = service.revert_current().await.unwrap();
            assert_eq!(reverted.hash, block.hash);

            let (expected, rows) = before.pop().unwrap();
            assert_eq!(snapshot(&service, &store).await, expected, "after reverting #{}", block.number);
            assert_eq!(store.row_count().unwrap(), rows);
        }

        assert!(matches!(
            service.revert_current().await,
            Err(ConsensusError::EmptyChain)
        ));
        assert_eq!(store.side_blocks().unwrap().len(), forge.blocks.len());
    }

    #[tokio::test]
    async fn test_reapply_after_revert() {
        let (forge, _) = create_reference_chain(7).await;
        let (service, store) = create_service(&test_params());
        for block in &forge.blocks {
            service.apply_block(block.clone()).await.unwrap();
        }
        let applied = snapshot(&service, &store).await;

        for _ in 0..3 {
            service.revert_current().await.unwrap();
        }
        for block in &forge.blocks[forge.blocks.len() - 3..] {
            service.apply_block(block.clone()).await.unwrap();
        }

        assert_eq!(snapshot(&service, &store).await, applied);
    }
}
