//! # Protocol Scenarios
//!
//! Boundary cases of the global rules and generators, played on forged chains
//! with real signatures.

#[cfg(test)]
mod tests {
    use crate::fixtures::{founders, test_params, ChainForge, Member};
    use lc_02_consensus_index::domain::max_block_size;
    use lc_02_consensus_index::{ConsensusError, Head, IndexStore, Rule};

    async fn create_founded_chain() -> (ChainForge, [Member; 3]) {
        let members = founders();
        let [alice, bob, carol] = &members;
        let mut forge = ChainForge::new(test_params());
        let genesis = forge.genesis(&[alice, bob, carol]);
        forge.push(genesis).await.unwrap();
        (forge, members)
    }

    /// Push empty blocks until one creates a dividend.
    async fn push_until_dividend(forge: &mut ChainForge, issuer: &Member) -> Head {
        loop {
            let head = forge.push_empty(issuer).await;
            if head.new_dividend.is_some() {
                return head;
            }
        }
    }

    fn rule_of(result: Result<Head, ConsensusError>) -> Option<Rule> {
        result.err().and_then(|err| err.rule())
    }

    #[tokio::test]
    async fn test_version_cannot_downgrade() {
        let (mut forge, [alice, ..]) = create_founded_chain().await;

        let mut older = forge.template(&alice);
        older.version = 9;
        assert_eq!(rule_of(forge.push(older).await), Some(Rule::Version));

        let mut upgraded = forge.template(&alice);
        upgraded.version = 11;
        assert_eq!(forge.push(upgraded).await.unwrap().version, 11);

        let mut back = forge.template(&alice);
        back.version = 10;
        assert_eq!(rule_of(forge.push(back).await), Some(Rule::Version));
    }

    #[test]
    fn test_block_size_boundary() {
        let head = |avg_block_size| Head {
            number: 18,
            bsize: 500,
            avg_block_size,
            ..Head::default()
        };

        let at_454 = head(454);
        assert!(at_454.bsize >= max_block_size(&at_454));

        let at_455 = head(455);
        assert!(at_455.bsize < max_block_size(&at_455));
    }

    #[tokio::test]
    async fn test_small_outputs_are_collected() {
        let (mut forge, [alice, ..]) = create_founded_chain().await;
        let dividend = push_until_dividend(&mut forge, &alice).await;
        let amount = dividend.new_dividend.unwrap();
        let zoe = Member::new(9, "zoe", &forge.stamp());

        let outputs = [
            (10, zoe.conditions()),
            (22, zoe.conditions()),
            (15, zoe.conditions()),
            (amount - 47, alice.conditions()),
        ];
        let tx = alice.spend_dividend(dividend.number, amount, &outputs, &forge.stamp());
        let tx_hash = tx.hash();
        let mut block = forge.template(&alice);
        block.transactions.push(tx);
        let head = forge.push(block).await.unwrap();

        let store = &forge.store;
        for pos in 0..3 {
            let source = store.source(&tx_hash, pos).await.unwrap().unwrap();
            assert!(source.consumed, "output {} is collected", pos);
        }
        assert!(!store.source(&tx_hash, 3).await.unwrap().unwrap().consumed);
        assert!(store.available_sources(&zoe.conditions()).await.unwrap().is_empty());
        let zoe_balance = store.wallet(&zoe.conditions()).await.unwrap().map_or(0, |w| w.balance);
        assert_eq!(zoe_balance, 0);
        let alice_balance = store.wallet(&alice.conditions()).await.unwrap().unwrap().balance;
        let new_dividend = head.new_dividend.unwrap_or(0);
        assert_eq!(alice_balance, (amount - 47 + new_dividend) as i64);
    }

    #[tokio::test]
    async fn test_dividend_starts_when_median_time_reaches_ud_time() {
        let (mut forge, [alice, ..]) = create_founded_chain().await;
        let params = test_params();

        let dividend = push_until_dividend(&mut forge, &alice).await;
        let before = forge.store.head(2).await.unwrap().unwrap();

        assert!(before.median_time < params.ud_time0);
        assert_eq!(before.ud_time, params.ud_time0);
        assert!(dividend.median_time >= params.ud_time0);
        assert_eq!(dividend.ud_time, params.ud_time0 + params.dt);
        assert_eq!(dividend.new_dividend, Some(params.ud0));
    }

    #[tokio::test]
    async fn test_forged_certification_is_refused() {
        let (mut forge, [alice, bob, carol]) = create_founded_chain().await;
        forge.push_empty(&alice).await;
        let dave = Member::new(4, "dave", &forge.stamp());

        let mut block = forge.newcomer(&alice, &dave, &[&alice, &bob]);
        // carol's signature under bob's name
        let forged = carol.certify(&dave, 1, &forge.blocks[1].hash);
        let sig = forged.rsplit(':').next().unwrap();
        block.certifications[1] = format!("{}:{}:1:{}", bob.pubkey, dave.pubkey, sig);

        assert_eq!(
            rule_of(forge.push(block).await),
            Some(Rule::CertificationSignature)
        );
    }

    #[tokio::test]
    async fn test_newcomer_needs_enough_certifications() {
        let (mut forge, [alice, ..]) = create_founded_chain().await;
        forge.push_empty(&alice).await;
        let dave = Member::new(4, "dave", &forge.stamp());

        let block = forge.newcomer(&alice, &dave, &[&alice]);

        assert_eq!(
            rule_of(forge.push(block).await),
            Some(Rule::MembershipEnoughCerts)
        );
    }

    #[tokio::test]
    async fn test_spending_twice_is_refused() {
        let (mut forge, [alice, bob, _]) = create_founded_chain().await;
        let dividend = push_until_dividend(&mut forge, &alice).await;
        let amount = dividend.new_dividend.unwrap();

        let outputs = [(amount, bob.conditions())];
        let tx = alice.spend_dividend(dividend.number, amount, &outputs, &forge.stamp());
        let mut block = forge.template(&alice);
        block.transactions.push(tx.clone());
        forge.push(block).await.unwrap();

        let mut replay = forge.template(&alice);
        replay.transactions.push(tx);
        assert_eq!(
            rule_of(forge.push(replay).await),
            Some(Rule::InputIsAvailable)
        );
    }

    #[tokio::test]
    async fn test_output_cannot_be_spent_in_its_own_block() {
        let (mut forge, [alice, bob, carol]) = create_founded_chain().await;
        let dividend = push_until_dividend(&mut forge, &alice).await;
        let amount = dividend.new_dividend.unwrap();

        let to_bob = alice.spend_dividend(dividend.number, amount, &[(amount, bob.conditions())], &forge.stamp());
        let to_carol = bob.spend_output(&to_bob, 0, &[(amount, carol.conditions())], &forge.stamp());
        let mut block = forge.template(&alice);
        block.transactions.push(to_bob.clone());
        block.transactions.push(to_carol.clone());
        assert_eq!(
            rule_of(forge.push(block).await),
            Some(Rule::InputIsAvailable)
        );

        // once written, the output can be spent
        let mut first = forge.template(&alice);
        first.transactions.push(to_bob);
        forge.push(first).await.unwrap();
        let mut second = forge.template(&alice);
        second.transactions.push(to_carol);
        forge.push(second).await.unwrap();
    }

    #[tokio::test]
    async fn test_spending_without_signature_is_refused() {
        let (mut forge, [alice, bob, _]) = create_founded_chain().await;
        let dividend = push_until_dividend(&mut forge, &alice).await;
        let amount = dividend.new_dividend.unwrap();

        // bob signs a transaction spending alice's dividend
        let mut tx = bob.spend_dividend(dividend.number, amount, &[(amount, bob.conditions())], &forge.stamp());
        tx.inputs = vec![format!("{}:0:D:{}:{}", amount, alice.pubkey, dividend.number)];
        let mut block = forge.template(&bob);
        block.transactions.push(tx);

        assert_eq!(
            rule_of(forge.push(block).await),
            Some(Rule::InputIsUnlocked)
        );
    }
}
