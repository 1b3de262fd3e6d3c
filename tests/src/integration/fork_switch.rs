//! # Fork Switch
//!
//! A node on one branch switches to a competing branch and ends in the same
//! state as a node that only ever saw that branch.

#[cfg(test)]
mod tests {
    use crate::fixtures::{founders, snapshot, test_params, ChainForge, Member};
    use lc_02_consensus_index::ports::BlockchainApi;
    use lc_02_consensus_index::{ConsensusError, Rule};

    /// Main chain: genesis then `length - 1` empty blocks by alice.
    async fn create_main(length: u64, founders: &[Member; 3]) -> ChainForge {
        let [alice, bob, carol] = founders;
        let mut forge = ChainForge::new(test_params());
        let genesis = forge.genesis(&[alice, bob, carol]);
        forge.push(genesis).await.unwrap();
        while forge.next_number() < length {
            forge.push_empty(alice).await;
        }
        forge
    }

    /// Competing branch after `fork_point`, where dave joins.
    async fn create_peer(main: &ChainForge, fork_point: u64, length: u64, founders: &[Member; 3]) -> ChainForge {
        let [alice, bob, _] = founders;
        let mut peer = ChainForge::new(test_params()).with_salt(1);
        for block in main.blocks.iter().filter(|b| b.number <= fork_point) {
            peer.adopt(block.clone()).await.unwrap();
        }
        let dave = Member::new(4, "dave", &peer.stamp());
        let block = peer.newcomer(bob, &dave, &[alice, bob]);
        peer.push(block).await.unwrap();
        while peer.next_number() < length {
            peer.push_empty(bob).await;
        }
        peer
    }

    #[tokio::test]
    async fn test_switch_to_longer_branch() {
        let founders = founders();
        let main = create_main(5, &founders).await;
        let peer = create_peer(&main, 2, 7, &founders).await;

        let head = main
            .service
            .switch_branch(2, peer.branch_after(2))
            .await
            .unwrap();

        assert_eq!(head.number, 6);
        assert_eq!(head.hash, peer.blocks.last().unwrap().hash);
        assert_eq!(
            snapshot(&main.service, &main.store).await,
            snapshot(&peer.service, &peer.store).await
        );
        let side: Vec<u64> = main
            .store
            .side_blocks()
            .unwrap()
            .iter()
            .map(|b| b.number)
            .collect();
        assert_eq!(side, vec![4, 3]);
    }

    #[tokio::test]
    async fn test_invalid_branch_restores_main_chain() {
        let founders = founders();
        let main = create_main(5, &founders).await;
        let before = snapshot(&main.service, &main.store).await;
        let peer = create_peer(&main, 2, 7, &founders).await;

        let mut branch = peer.branch_after(2);
        if let Some(block) = branch.get_mut(2) {
            block.issuers_count += 1;
        }

        let err = main.service.switch_branch(2, branch).await.unwrap_err();

        assert_eq!(err.rule(), Some(Rule::IssuersCount));
        assert_eq!(snapshot(&main.service, &main.store).await, before);
        assert!(main.service.halted().is_none());
    }

    #[tokio::test]
    async fn test_fork_older_than_window_is_refused() {
        let founders = founders();
        let main = create_main(9, &founders).await;
        let window = test_params().fork_window_size;

        let result = main.service.switch_branch(1, vec![]).await;

        assert!(matches!(
            result,
            Err(ConsensusError::ForkTooOld { fork_point: 1, window: w }) if w == window
        ));
    }
}
