//! End-to-end proof-of-stake checks
//!
//! Builds a regtest chain in the arena index backed by a temporary block
//! database, finds kernels with the stake miner and validates the resulting
//! blocks with real Schnorr-signed coinstakes.

use pos_kernel::consensus::{
    check_proof_of_stake, connect_stake_modifier, Block, BlockHeader, ChainParams, PosError,
};
use pos_kernel::crypto::{Hash, PrivateKey};
use pos_kernel::mining::{StakeMiner, StakeSearchResult};
use pos_kernel::stake::{PrivacyPoolStake, RegularOutputStake, StakeInput};
use pos_kernel::storage::{BlockDb, BlockIndexArena, BlockIndexNode, ChainView};
use pos_kernel::validation::{
    OutPoint, PrivacyPoolSpend, SchnorrScriptVerifier, ScriptError, SpendPurpose, Transaction, TxIn, TxOut,
};

/// Weighted V2 target just below 2^256 for a 1000-coin stake
const STAKE_BITS: u32 = 0x1d03_ffff;
const GENESIS_TIME: u32 = 1_700_000_000;
const BLOCKS: u32 = 60;

struct TestChain {
    arena: BlockIndexArena,
    db: BlockDb,
    params: ChainParams,
    key: PrivateKey,
    funding: Transaction,
}

impl TestChain {
    /// Genesis pays 1000 coins to `key`, followed by proof-of-work blocks
    /// one minute apart.
    fn new() -> Self {
        let params = ChainParams::regtest();
        let key = PrivateKey::generate();
        let lock = key.public_key().pubkey_hash().0.to_vec();
        let funding = Transaction::coinbase(GENESIS_TIME, 1_000 * params.coin, lock);

        let db = BlockDb::temporary().unwrap();
        let mut arena = BlockIndexArena::new();
        let mut prev_hash = Hash::zero();

        for i in 0..BLOCKS {
            let time = GENESIS_TIME + i * 60;
            let tx = if i == 0 {
                funding.clone()
            } else {
                Transaction::coinbase(time, 50, vec![0; 32])
            };
            let header = BlockHeader::new(1, prev_hash, tx.hash(), time, 0x207f_ffff, i);
            let block = Block::new(header, vec![tx]);
            let pos = db.write_block(&block).unwrap();

            let checkpoint = pos_kernel::crypto::hash256(format!("accumulator-{}", i).as_bytes());
            let node = BlockIndexNode::new(block.hash(), time)
                .with_pos(pos)
                .with_accumulator_checkpoint(checkpoint);
            let id = arena.append(node);
            connect_stake_modifier(&mut arena, id, &block.hash(), &params).unwrap();
            prev_hash = block.hash();
        }

        Self { arena, db, params, key, funding }
    }

    fn tip(&self) -> &BlockIndexNode {
        self.arena.tip().unwrap()
    }

    fn regular_stake(&self) -> StakeInput {
        let genesis = self.arena.by_height(0).unwrap().hash;
        StakeInput::RegularOutput(RegularOutputStake::new(self.funding.clone(), 0, genesis).unwrap())
    }

    /// First winning transaction time at or after the tip time
    fn find_kernel(&self, stake: &StakeInput) -> (u32, Hash) {
        let miner = StakeMiner::new();
        let mut start = self.tip().time;
        for _ in 0..32 {
            match miner
                .search_kernel(stake, STAKE_BITS, GENESIS_TIME, start, &self.arena, &self.params, || false)
                .unwrap()
            {
                StakeSearchResult::Found { tx_time, proof_hash } => return (tx_time, proof_hash),
                _ => start += 30,
            }
        }
        panic!("no kernel found");
    }

    /// Coinstake spending the genesis output, signed into the witness
    fn signed_coinstake(&self, time: u32) -> Transaction {
        let prevout = OutPoint::new(self.funding.hash(), 0);
        let lock = self.key.public_key().pubkey_hash().0.to_vec();
        let mut tx = Transaction::new(
            time,
            vec![TxIn::new(prevout, Vec::new())],
            vec![TxOut::empty(), TxOut::new(1_000 * self.params.coin + 10, lock)],
        );
        let sig = self.key.sign(&tx.signature_hash(0));
        tx.inputs[0].witness = vec![sig.0.to_vec(), self.key.public_key().0.to_vec()];
        tx
    }

    fn stake_block(&self, coinstake: Transaction, bits: u32) -> Block {
        let time = coinstake.time;
        let header = BlockHeader::new(8, self.tip().hash, Hash::zero(), time, bits, 0);
        Block::new(header, vec![Transaction::coinbase(time, 0, Vec::new()), coinstake])
    }

    fn check(&self, block: &Block) -> Result<pos_kernel::consensus::ProofOfStake, PosError> {
        check_proof_of_stake(block, &self.arena, &self.db, &self.db, &SchnorrScriptVerifier, &self.params)
    }
}

#[test]
fn test_mined_regular_stake_is_accepted() {
    let chain = TestChain::new();
    let stake = chain.regular_stake();
    let (tx_time, proof_hash) = chain.find_kernel(&stake);

    let block = chain.stake_block(chain.signed_coinstake(tx_time), STAKE_BITS);
    let proof = chain.check(&block).unwrap();

    assert_eq!(proof.proof_hash, proof_hash);
    assert_eq!(proof.stake, stake);
    assert_eq!(proof.stake.value(), 1_000 * chain.params.coin);
}

#[test]
fn test_accepted_block_connects_its_modifier() {
    let mut chain = TestChain::new();
    let stake = chain.regular_stake();
    let (tx_time, _) = chain.find_kernel(&stake);
    let block = chain.stake_block(chain.signed_coinstake(tx_time), STAKE_BITS);
    let proof = chain.check(&block).unwrap();

    let node = BlockIndexNode::new(block.hash(), tx_time)
        .with_version(8)
        .with_proof_of_stake(proof.proof_hash);
    let id = chain.arena.append(node);
    let kernel = block.transactions[1].inputs[0].prevout.hash;
    let checksum = connect_stake_modifier(&mut chain.arena, id, &kernel, &chain.params).unwrap();

    let connected = chain.arena.node(id).unwrap();
    assert!(connected.has_stake_modifier());
    assert_eq!(connected.stake_modifier_checksum, checksum);
    assert_eq!(connected.height, u64::from(BLOCKS));
}

#[test]
fn test_forged_signature_rejected() {
    let chain = TestChain::new();
    let (tx_time, _) = chain.find_kernel(&chain.regular_stake());

    let mut coinstake = chain.signed_coinstake(tx_time);
    coinstake.inputs[0].witness[0][0] ^= 0x01;
    let block = chain.stake_block(coinstake, STAKE_BITS);

    assert_eq!(chain.check(&block), Err(PosError::SignatureInvalid(ScriptError::BadSignature)));
}

#[test]
fn test_foreign_key_rejected() {
    let chain = TestChain::new();
    let (tx_time, _) = chain.find_kernel(&chain.regular_stake());

    let thief = PrivateKey::generate();
    let mut coinstake = chain.signed_coinstake(tx_time);
    let sig = thief.sign(&coinstake.signature_hash(0));
    coinstake.inputs[0].witness = vec![sig.0.to_vec(), thief.public_key().0.to_vec()];
    let block = chain.stake_block(coinstake, STAKE_BITS);

    assert_eq!(chain.check(&block), Err(PosError::SignatureInvalid(ScriptError::PubKeyMismatch)));
}

#[test]
fn test_impossible_target_rejected() {
    let chain = TestChain::new();
    let (tx_time, proof_hash) = chain.find_kernel(&chain.regular_stake());
    let block = chain.stake_block(chain.signed_coinstake(tx_time), 0);

    assert_eq!(chain.check(&block), Err(PosError::KernelTargetNotMet { hash: proof_hash }));
}

#[test]
fn test_missing_previous_transaction() {
    let chain = TestChain::new();
    let mut coinstake = chain.signed_coinstake(chain.tip().time);
    coinstake.inputs[0].prevout = OutPoint::new(pos_kernel::crypto::hash256(b"never mined"), 0);
    let block = chain.stake_block(coinstake, STAKE_BITS);

    assert!(matches!(chain.check(&block), Err(PosError::ChainLookupFailed(_))));
}

#[test]
fn test_privacy_pool_stake_is_accepted() {
    let chain = TestChain::new();
    let spend = PrivacyPoolSpend::new(
        SpendPurpose::Stake,
        pos_kernel::crypto::hash256(b"serial"),
        1_000,
        0,
        vec![0xab; 64],
    );
    let stake = StakeInput::PrivacyPool(PrivacyPoolStake::new(spend.clone(), &chain.params));
    let (tx_time, proof_hash) = chain.find_kernel(&stake);

    let coinstake = Transaction::new(
        tx_time,
        vec![TxIn::new(OutPoint::null(), spend.to_script_sig().unwrap())],
        vec![TxOut::empty(), TxOut::new(1_000 * chain.params.coin, vec![1; 32])],
    );
    let block = chain.stake_block(coinstake, STAKE_BITS);
    let proof = chain.check(&block).unwrap();

    assert_eq!(proof.proof_hash, proof_hash);
    assert!(proof.stake.is_privacy());
}

#[test]
fn test_privacy_transfer_cannot_stake() {
    let chain = TestChain::new();
    let spend = PrivacyPoolSpend::new(
        SpendPurpose::Transfer,
        pos_kernel::crypto::hash256(b"serial"),
        1_000,
        0,
        vec![],
    );
    let coinstake = Transaction::new(
        chain.tip().time,
        vec![TxIn::new(OutPoint::null(), spend.to_script_sig().unwrap())],
        vec![TxOut::empty(), TxOut::new(1, vec![1; 32])],
    );
    let block = chain.stake_block(coinstake, STAKE_BITS);

    assert!(matches!(chain.check(&block), Err(PosError::UnsupportedSpendType(_))));
}

#[test]
fn test_plain_block_is_not_proof_of_stake() {
    let chain = TestChain::new();
    let time = chain.tip().time + 60;
    let header = BlockHeader::new(8, chain.tip().hash, Hash::zero(), time, STAKE_BITS, 0);
    let block = Block::new(header, vec![Transaction::coinbase(time, 50, Vec::new())]);

    assert_eq!(chain.check(&block), Err(PosError::NotCoinstake(block.hash())));
}
