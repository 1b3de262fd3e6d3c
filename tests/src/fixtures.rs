//! # Test Fixtures
//!
//! Signed members and a block forge shared by the integration tests and the
//! benches.
//!
//! The forge fills every header field the global rules compare with the
//! derived HEAD (issuers frame, median time, dividend, members count, ...),
//! then applies the block on its own service. Forged blocks are therefore
//! valid on any node that applied the same history.

use lc_01_web_of_trust::TrustGraph;
use lc_02_consensus_index::ports::BlockchainApi;
use lc_02_consensus_index::{
    local_index, stored_head, BlockchainDependencies, BlockchainService, ConsensusResult,
    CurrencyParameters, Ed25519Verifier, Head, InMemoryIndexStore, InMemoryTransactionPool,
    IndexStore,
};
use shared_crypto::Ed25519KeyPair;
use shared_types::constants::{SPECIAL_BLOCK, SPECIAL_HASH};
use shared_types::documents::{certification_raw, identity_raw, IdentityRef};
use shared_types::{Block, Transaction};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const GENESIS_TIME: u64 = 1_500_000_000;
pub const BLOCK_INTERVAL: u64 = 60;
pub const CURRENCY: &str = "test";

pub type TestService =
    BlockchainService<InMemoryIndexStore, Ed25519Verifier, InMemoryTransactionPool>;

/// Small windows and a short fork window, so a few dozen blocks exercise
/// dividends, trimming and quick sync.
pub fn test_params() -> CurrencyParameters {
    CurrencyParameters {
        currency: CURRENCY.to_string(),
        c: 0.1,
        dt: 100,
        dt_reeval: 400,
        ud0: 1_000,
        ud_time0: GENESIS_TIME + 100,
        ud_reeval_time0: GENESIS_TIME + 100,
        sig_period: 0,
        sig_stock: 10,
        sig_window: 100_000,
        sig_validity: 1_000_000,
        sig_qty: 2,
        idty_window: 100_000,
        ms_window: 100_000,
        ms_period: 0,
        ms_validity: 1_000_000,
        x_percent: 0.8,
        step_max: 5,
        median_time_blocks: 3,
        avg_gen_time: BLOCK_INTERVAL,
        dt_diff_eval: 10,
        percent_rot: 0.67,
        fork_window_size: 5,
    }
}

/// Block hash meeting every difficulty reached in the tests.
pub fn pow_hash(seed: u64) -> String {
    format!("0000{:060X}", seed)
}

pub fn create_service(params: &CurrencyParameters) -> (TestService, Arc<InMemoryIndexStore>) {
    let store = Arc::new(InMemoryIndexStore::new());
    let deps = BlockchainDependencies {
        store: Arc::clone(&store),
        verifier: Arc::new(Ed25519Verifier),
        pool: Arc::new(InMemoryTransactionPool::new()),
        params: params.clone(),
    };
    (BlockchainService::new(deps).expect("valid test parameters"), store)
}

// =============================================================================
// MEMBERS
// =============================================================================

/// An identity with its signing keys.
pub struct Member {
    keys: Ed25519KeyPair,
    pub pubkey: String,
    pub uid: String,
    /// Blockstamp the identity refers to.
    pub buid: String,
    pub idty_sig: String,
}

impl Member {
    pub fn new(seed: u8, uid: &str, buid: &str) -> Self {
        let keys = Ed25519KeyPair::from_seed([seed; 32]);
        let pubkey = keys.pubkey();
        let raw = identity_raw(
            CURRENCY,
            &IdentityRef {
                pubkey: &pubkey,
                uid,
                buid,
                sig: "",
            },
        );
        let idty_sig = keys.sign_document(&raw);
        Self {
            keys,
            pubkey,
            uid: uid.to_string(),
            buid: buid.to_string(),
            idty_sig,
        }
    }

    /// Member written in the genesis block.
    pub fn founder(seed: u8, uid: &str) -> Self {
        Self::new(seed, uid, SPECIAL_BLOCK)
    }

    pub fn conditions(&self) -> String {
        format!("SIG({})", self.pubkey)
    }

    fn idty_ref(&self) -> IdentityRef<'_> {
        IdentityRef {
            pubkey: &self.pubkey,
            uid: &self.uid,
            buid: &self.buid,
            sig: &self.idty_sig,
        }
    }

    /// Inline identity record.
    pub fn identity(&self) -> String {
        format!("{}:{}:{}:{}", self.pubkey, self.idty_sig, self.buid, self.uid)
    }

    /// Inline JOIN membership based on `ms_buid`.
    pub fn joiner(&self, ms_buid: &str) -> String {
        let sig = self
            .keys
            .sign_document(&format!("Membership:{}:{}:IN", ms_buid, self.uid));
        format!(
            "{}:{}:{}:{}:{}",
            self.pubkey, sig, ms_buid, self.buid, self.uid
        )
    }

    /// Inline certification of `receiver`, based on block `created_on` whose
    /// hash is `based_hash`.
    pub fn certify(&self, receiver: &Member, created_on: u64, based_hash: &str) -> String {
        let cert_buid = format!("{}-{}", created_on, based_hash);
        let raw = certification_raw(CURRENCY, &self.pubkey, &receiver.idty_ref(), &cert_buid);
        format!(
            "{}:{}:{}:{}",
            self.pubkey,
            receiver.pubkey,
            created_on,
            self.keys.sign_document(&raw)
        )
    }

    /// Signed transaction spending the dividend created at `dividend_block`.
    pub fn spend_dividend(
        &self,
        dividend_block: u64,
        amount: u64,
        outputs: &[(u64, String)],
        blockstamp: &str,
    ) -> Transaction {
        let input = format!("{}:0:D:{}:{}", amount, self.pubkey, dividend_block);
        self.spend(input, outputs, blockstamp)
    }

    /// Spends output `pos` of `source`, which must be locked by this member.
    pub fn spend_output(
        &self,
        source: &Transaction,
        pos: usize,
        outputs: &[(u64, String)],
        blockstamp: &str,
    ) -> Transaction {
        let amount = source.outputs[pos].split(':').next().unwrap_or("0");
        let input = format!("{}:0:T:{}:{}", amount, source.hash(), pos);
        self.spend(input, outputs, blockstamp)
    }

    fn spend(&self, input: String, outputs: &[(u64, String)], blockstamp: &str) -> Transaction {
        let mut tx = Transaction {
            version: 10,
            currency: CURRENCY.to_string(),
            blockstamp: blockstamp.to_string(),
            issuers: vec![self.pubkey.clone()],
            inputs: vec![input],
            unlocks: vec!["0:SIG(0)".to_string()],
            outputs: outputs
                .iter()
                .map(|(amount, conditions)| format!("{}:0:{}", amount, conditions))
                .collect(),
            ..Transaction::default()
        };
        tx.signatures = vec![self.keys.sign_document(&tx.raw_without_signatures())];
        tx
    }
}

// =============================================================================
// FORGE
// =============================================================================

/// Builds valid blocks on top of its own service.
pub struct ChainForge {
    pub params: CurrencyParameters,
    pub service: TestService,
    pub store: Arc<InMemoryIndexStore>,
    pub blocks: Vec<Block>,
    salt: u64,
}

impl ChainForge {
    pub fn new(params: CurrencyParameters) -> Self {
        let (service, store) = create_service(&params);
        Self {
            params,
            service,
            store,
            blocks: Vec::new(),
            salt: 0,
        }
    }

    /// Distinguish the hashes of this forge from another one on the same history.
    pub fn with_salt(mut self, salt: u64) -> Self {
        self.salt = salt;
        self
    }

    pub fn next_number(&self) -> u64 {
        self.blocks.last().map_or(0, |b| b.number + 1)
    }

    /// Blockstamp of the last block, as written in documents.
    pub fn stamp(&self) -> String {
        self.blocks
            .last()
            .map(|b| b.blockstamp().to_string())
            .unwrap_or_else(|| SPECIAL_BLOCK.to_string())
    }

    /// Empty block issued by `issuer`, header left to [`ChainForge::forge`].
    pub fn template(&self, issuer: &Member) -> Block {
        let number = self.next_number();
        let time = GENESIS_TIME + BLOCK_INTERVAL * number;
        Block {
            version: 10,
            currency: CURRENCY.to_string(),
            number,
            hash: pow_hash(self.salt * 1_000_000 + number),
            issuer: issuer.pubkey.clone(),
            time,
            median_time: time,
            ..Block::default()
        }
    }

    /// Genesis where every founder certifies every other one.
    pub fn genesis(&self, founders: &[&Member]) -> Block {
        let mut block = self.template(founders[0]);
        for member in founders {
            block.identities.push(member.identity());
            block.joiners.push(member.joiner(SPECIAL_BLOCK));
        }
        for issuer in founders {
            for receiver in founders {
                if issuer.pubkey != receiver.pubkey {
                    block
                        .certifications
                        .push(issuer.certify(receiver, 0, SPECIAL_HASH));
                }
            }
        }
        block
    }

    /// Newcomer block: `newcomer` joins, certified by `certifiers` on the last block.
    pub fn newcomer(&self, issuer: &Member, newcomer: &Member, certifiers: &[&Member]) -> Block {
        let mut block = self.template(issuer);
        let (number, hash) = self
            .blocks
            .last()
            .map(|b| (b.number, b.hash.clone()))
            .unwrap_or((0, SPECIAL_HASH.to_string()));
        block.identities.push(newcomer.identity());
        block.joiners.push(newcomer.joiner(&self.stamp()));
        for certifier in certifiers {
            block
                .certifications
                .push(certifier.certify(newcomer, number, &hash));
        }
        block
    }

    /// Fill the header fields checked against the HEAD.
    pub async fn forge(&self, mut block: Block) -> Block {
        let index = local_index(&block, &self.params).expect("well-formed block");
        let (head, _) = stored_head(&*self.store, &block, &index, &self.params)
            .await
            .expect("head derivation");
        block.previous_hash = head.previous_hash.clone();
        block.previous_issuer = head.previous_issuer.clone();
        block.median_time = head.median_time;
        block.issuers_count = head.issuers_count;
        block.issuers_frame = head.issuers_frame;
        block.issuers_frame_var = head.issuers_frame_var;
        block.dividend = head.new_dividend;
        block.unit_base = head.unit_base;
        block.members_count = head.members_count;
        block.pow_min = head.pow_min;
        block
    }

    /// Forge `block`, apply it and keep it.
    pub async fn push(&mut self, block: Block) -> ConsensusResult<Head> {
        let block = self.forge(block).await;
        self.adopt(block).await
    }

    /// Apply an already forged block and keep it.
    pub async fn adopt(&mut self, block: Block) -> ConsensusResult<Head> {
        let head = self.service.apply_block(block.clone()).await?;
        self.blocks.push(block);
        Ok(head)
    }

    pub async fn push_empty(&mut self, issuer: &Member) -> Head {
        let block = self.template(issuer);
        self.push(block).await.expect("empty block applies")
    }

    /// Blocks of this forge after `fork_point`.
    pub fn branch_after(&self, fork_point: u64) -> Vec<Block> {
        self.blocks
            .iter()
            .filter(|b| b.number > fork_point)
            .cloned()
            .collect()
    }
}

/// The founders of every test currency.
pub fn founders() -> [Member; 3] {
    [
        Member::founder(1, "alice"),
        Member::founder(2, "bob"),
        Member::founder(3, "carol"),
    ]
}

/// Chain used by most integration tests, with its members:
///
/// - genesis with alice, bob and carol
/// - dave joins at #2, certified by alice and bob
/// - dividends from the first block reaching `udTime0`
/// - alice spends her first dividend at the block after
pub async fn create_reference_chain(length: u64) -> (ChainForge, Vec<Member>) {
    let [alice, bob, carol] = founders();
    let mut forge = ChainForge::new(test_params());
    let genesis = forge.genesis(&[&alice, &bob, &carol]);
    forge.push(genesis).await.expect("genesis applies");
    forge.push_empty(&alice).await;

    let dave = Member::new(4, "dave", &forge.stamp());
    let block = forge.newcomer(&bob, &dave, &[&alice, &bob]);
    forge.push(block).await.expect("newcomer applies");

    let mut first_dividend: Option<(u64, u64)> = None;
    let mut spent = false;
    while forge.next_number() < length {
        match first_dividend {
            Some((number, amount)) if !spent => {
                let tx = alice.spend_dividend(
                    number,
                    amount,
                    &[(400, bob.conditions()), (amount - 400, alice.conditions())],
                    &forge.stamp(),
                );
                let mut block = forge.template(&alice);
                block.transactions.push(tx);
                forge.push(block).await.expect("transfer applies");
                spent = true;
            }
            _ => {
                let head = forge.push_empty(&alice).await;
                if first_dividend.is_none() {
                    first_dividend = head.new_dividend.map(|amount| (head.number, amount));
                }
            }
        }
    }
    (forge, vec![alice, bob, carol, dave])
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

/// Observable state of a node, compared across replays.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub head: Option<Head>,
    pub members: Vec<String>,
    pub graph: TrustGraph,
    /// Non-zero balances by condition.
    pub balances: BTreeMap<String, i64>,
}

pub async fn snapshot(service: &TestService, store: &InMemoryIndexStore) -> Snapshot {
    let balances = store
        .wallets()
        .expect("wallets")
        .into_iter()
        .filter(|w| w.balance != 0)
        .map(|w| (w.conditions, w.balance))
        .collect();
    Snapshot {
        head: service.current_head().await.expect("head"),
        members: store.members().await.expect("members"),
        graph: service.trust_graph(),
        balances,
    }
}
