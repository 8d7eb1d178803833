//! Proof-of-stake block checks
//!
//! Validates the kernel of a block's coinstake: resolves the staked input,
//! verifies ownership, locates the origin block and checks the kernel hash
//! against the block target under the protocol the block version selects.

use crate::consensus::{
    check_stake, check_stake_v1, Block, ChainParams, HashTarget, PosError, Result,
};
use crate::crypto::Hash;
use crate::stake::{PrivacyPoolStake, RegularOutputStake, StakeInput};
use crate::storage::{BlockStore, ChainView, TransactionLookup};
use crate::validation::{PrivacyPoolSpend, ScriptVerifier, SpendPurpose, Transaction, TxContext};

/// Accepted proof of stake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfStake {
    /// Kernel hash, cached on the block index as the proof hash
    pub proof_hash: Hash,
    pub stake: StakeInput,
}

/// Proof-of-stake checker over the node's collaborators
pub struct ProofOfStakeChecker<'a> {
    chain: &'a dyn ChainView,
    store: &'a dyn BlockStore,
    txs: &'a dyn TransactionLookup,
    scripts: &'a dyn ScriptVerifier,
    params: &'a ChainParams,
}

impl<'a> ProofOfStakeChecker<'a> {
    pub fn new(
        chain: &'a dyn ChainView,
        store: &'a dyn BlockStore,
        txs: &'a dyn TransactionLookup,
        scripts: &'a dyn ScriptVerifier,
        params: &'a ChainParams,
    ) -> Self {
        Self { chain, store, txs, scripts, params }
    }

    /// Check the proof of stake of `block`, whose parent must be indexed
    #[tracing::instrument(level = "debug", skip_all, fields(block = %block.hash()))]
    pub fn check(&self, block: &Block) -> Result<ProofOfStake> {
        self.check_inner(block).map_err(|e| {
            tracing::warn!("proof of stake rejected: {}", e);
            e
        })
    }

    fn check_inner(&self, block: &Block) -> Result<ProofOfStake> {
        let coinstake = block.coinstake().ok_or_else(|| PosError::NotCoinstake(block.hash()))?;

        let prev = self.chain.by_hash(&block.header.prev_hash).ok_or_else(|| {
            PosError::ChainLookupFailed(format!("previous block {} not indexed", block.header.prev_hash))
        })?;
        let height = prev.height + 1;
        let epoch = self.params.epoch_at(height);

        let stake = self.stake_input(coinstake, height)?;

        let from = stake.index_from(self.chain)?;
        let origin = self.store.read_block(from.pos).ok_or_else(|| {
            PosError::ChainLookupFailed(format!("failed to read origin block {}", from.hash))
        })?;
        let origin_time = origin.header.time;

        let target = HashTarget::from_compact(block.header.bits);

        if block.header.version > self.params.legacy_block_version {
            let modifier = stake.modifier(self.chain, self.params, epoch)?;
            let (hit, proof_hash) = check_stake(
                &stake.uniqueness(),
                stake.value(),
                modifier,
                &target,
                origin_time,
                coinstake.time,
            );
            if !hit {
                return Err(PosError::KernelTargetNotMet { hash: proof_hash });
            }
            return Ok(ProofOfStake { proof_hash, stake });
        }

        let StakeInput::RegularOutput(regular) = &stake else {
            return Err(PosError::UnsupportedSpendType(
                "privacy-pool stake in a legacy block".into(),
            ));
        };
        let (hit, proof_hash) = check_stake_v1(
            regular.tx_from().time,
            regular.prevout(),
            coinstake.time,
            &target,
            stake.value(),
            &prev.stake_modifier_v2,
        )?;
        if !hit {
            return Err(PosError::KernelTargetNotMet { hash: proof_hash });
        }
        Ok(ProofOfStake { proof_hash, stake })
    }

    /// Build the stake input from the coinstake's first input
    fn stake_input(&self, coinstake: &Transaction, height: u64) -> Result<StakeInput> {
        let txin = coinstake
            .inputs
            .first()
            .ok_or_else(|| PosError::NotCoinstake(coinstake.hash()))?;

        if txin.is_privacy_spend() {
            let spend = PrivacyPoolSpend::from_tx_in(txin)?;
            if spend.purpose() != SpendPurpose::Stake {
                return Err(PosError::UnsupportedSpendType(format!(
                    "privacy spend with purpose {:?} used as a kernel",
                    spend.purpose()
                )));
            }
            return Ok(StakeInput::PrivacyPool(PrivacyPoolStake::new(spend, self.params)));
        }

        let (prev_tx, block_hash) = self.txs.get_transaction(&txin.prevout.hash).ok_or_else(|| {
            PosError::ChainLookupFailed(format!("previous transaction {} unavailable", txin.prevout.hash))
        })?;
        let regular = RegularOutputStake::new(prev_tx, txin.prevout.index, block_hash)?;

        let witness = if self.params.witness_active(height) {
            Some(txin.witness.as_slice())
        } else {
            None
        };
        let ctx = TxContext { tx: coinstake, input_index: 0 };
        self.scripts
            .verify(&txin.script_sig, &regular.output().script_pubkey, witness, &ctx)?;

        Ok(StakeInput::RegularOutput(regular))
    }
}

/// Check the proof of stake of `block` against the given collaborators
pub fn check_proof_of_stake(
    block: &Block,
    chain: &dyn ChainView,
    store: &dyn BlockStore,
    txs: &dyn TransactionLookup,
    scripts: &dyn ScriptVerifier,
    params: &ChainParams,
) -> Result<ProofOfStake> {
    ProofOfStakeChecker::new(chain, store, txs, scripts, params).check(block)
}
