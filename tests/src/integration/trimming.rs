//! # History Trimming
//!
//! Past the bindex length, old HEADs and superseded index rows are dropped.
//! The reduced state stays the one of a node that never trims, and the
//! fork window still reaches back `forkWindowSize` blocks.

#[cfg(test)]
mod tests {
    use crate::fixtures::{create_reference_chain, create_service, snapshot, test_params, ChainForge, Member};
    use lc_02_consensus_index::ports::BlockchainApi;
    use lc_02_consensus_index::{ConsensusError, IndexStore};

    const LENGTH: u64 = 40;

    #[tokio::test]
    async fn test_trimmed_store_keeps_reduced_state() {
        let (mut forge, members) = create_reference_chain(LENGTH).await;
        let mut untrimmed_params = test_params();
        untrimmed_params.fork_window_size = 1_000;
        let (replica, replica_store) = create_service(&untrimmed_params);
        for block in &forge.blocks {
            replica.apply_block(block.clone()).await.unwrap();
        }

        let head = forge.service.current_head().await.unwrap().unwrap();
        let keep = test_params().bindex_size(head.issuers_count, head.issuers_frame);
        assert!(head.number > keep);
        assert_eq!(forge.store.heads(100).await.unwrap().len() as u64, keep);
        assert_eq!(replica_store.heads(100).await.unwrap().len() as u64, LENGTH);
        assert!(forge.store.row_count().unwrap() < replica_store.row_count().unwrap());

        assert_eq!(
            snapshot(&forge.service, &forge.store).await,
            snapshot(&replica, &replica_store).await
        );
        for member in &members {
            assert_eq!(
                forge.store.iindex_reduced(&member.pubkey).await.unwrap(),
                replica_store.iindex_reduced(&member.pubkey).await.unwrap(),
                "identity of {}",
                member.uid
            );
            assert_eq!(
                forge.store.mindex_reduced(&member.pubkey).await.unwrap(),
                replica_store.mindex_reduced(&member.pubkey).await.unwrap(),
                "membership of {}",
                member.uid
            );
        }

        // bob's output, written before the trimmed range, is still spendable
        let [alice, bob, carol, _] = &members[..] else {
            panic!("four members");
        };
        let transfer = forge
            .blocks
            .iter()
            .flat_map(|b| b.transactions.iter())
            .next()
            .cloned()
            .unwrap();
        assert!(forge.blocks.iter().any(|b| !b.transactions.is_empty() && b.number + keep < head.number));
        let tx = bob.spend_output(&transfer, 0, &[(400, carol.conditions())], &forge.stamp());
        let mut block = forge.template(alice);
        block.transactions.push(tx);
        forge.push(block).await.unwrap();
        replica
            .apply_block(forge.blocks.last().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(
            snapshot(&forge.service, &forge.store).await,
            snapshot(&replica, &replica_store).await
        );
    }

    /// Competing branch of `main` after `fork_point`, issued by bob.
    async fn create_branch(main: &ChainForge, fork_point: u64, length: u64, issuer: &Member) -> ChainForge {
        let mut peer = ChainForge::new(test_params()).with_salt(1);
        for block in main.blocks.iter().filter(|b| b.number <= fork_point) {
            peer.adopt(block.clone()).await.unwrap();
        }
        while peer.next_number() < length {
            peer.push_empty(issuer).await;
        }
        peer
    }

    #[tokio::test]
    async fn test_fork_window_survives_trimming() {
        let (main, members) = create_reference_chain(LENGTH).await;
        let window = test_params().fork_window_size;
        let current = LENGTH - 1;
        let fork_point = current - window;
        let peer = create_branch(&main, fork_point, LENGTH + 1, &members[1]).await;

        let too_old = main.service.switch_branch(fork_point - 1, vec![]).await;
        assert!(matches!(
            too_old,
            Err(ConsensusError::ForkTooOld { fork_point: f, window: w }) if f == fork_point - 1 && w == window
        ));

        let head = main
            .service
            .switch_branch(fork_point, peer.branch_after(fork_point))
            .await
            .unwrap();

        assert_eq!(head.number, LENGTH);
        assert!(main.service.halted().is_none());
        assert_eq!(
            snapshot(&main.service, &main.store).await,
            snapshot(&peer.service, &peer.store).await
        );
    }
}
