//! Stake inputs
//!
//! The funding source behind a coinstake kernel: either an ordinary
//! transaction output or a privacy-pool coin.

use crate::consensus::{get_kernel_stake_modifier, ChainParams, PosError, ProtocolEpoch, Result};
use crate::crypto::Hash;
use crate::storage::{BlockIndexNode, ChainView};
use crate::validation::{OutPoint, PrivacyPoolSpend, Transaction, TxOut};

/// Length of every uniqueness fingerprint
pub const UNIQUENESS_LEN: usize = 36;

/// An unspent output of a confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularOutputStake {
    prev_tx: Transaction,
    prevout: OutPoint,
    /// Block that confirmed `prev_tx`
    block_hash: Hash,
}

impl RegularOutputStake {
    /// Stake output `index` of `prev_tx`, confirmed in `block_hash`
    pub fn new(prev_tx: Transaction, index: u32, block_hash: Hash) -> Result<Self> {
        let txid = prev_tx.hash();
        if prev_tx.outputs.get(index as usize).is_none() {
            return Err(PosError::ChainLookupFailed(format!(
                "output {}:{} does not exist",
                txid, index
            )));
        }
        Ok(Self {
            prev_tx,
            prevout: OutPoint::new(txid, index),
            block_hash,
        })
    }

    pub fn prevout(&self) -> &OutPoint {
        &self.prevout
    }

    pub fn tx_from(&self) -> &Transaction {
        &self.prev_tx
    }

    pub fn output(&self) -> &TxOut {
        // index checked on construction
        &self.prev_tx.outputs[self.prevout.index as usize]
    }

    pub fn block_hash(&self) -> Hash {
        self.block_hash
    }
}

/// A privacy-pool coin spent for staking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivacyPoolStake {
    spend: PrivacyPoolSpend,
    value: u64,
}

impl PrivacyPoolStake {
    pub fn new(spend: PrivacyPoolSpend, params: &ChainParams) -> Self {
        let value = u64::from(spend.denomination()).saturating_mul(params.coin);
        Self { spend, value }
    }

    pub fn spend(&self) -> &PrivacyPoolSpend {
        &self.spend
    }

    /// Modifier fixed once the chain has advanced past the privacy delay:
    /// the low 64 bits of the first later block's accumulator checkpoint.
    fn modifier(&self, from: &BlockIndexNode, chain: &dyn ChainView, params: &ChainParams) -> Result<u64> {
        let delay = i64::from(params.privacy_modifier_delay);
        let mut node = from;
        while node.block_time() - from.block_time() <= delay {
            node = chain.by_height(node.height + 1).ok_or_else(|| {
                PosError::ChainLookupFailed(format!(
                    "privacy stake modifier for height {} not yet reached",
                    from.height
                ))
            })?;
        }
        Ok(node.accumulator_checkpoint.low_u64())
    }
}

/// Kernel input of a coinstake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakeInput {
    RegularOutput(RegularOutputStake),
    PrivacyPool(PrivacyPoolStake),
}

impl StakeInput {
    /// Staked amount in base units
    pub fn value(&self) -> u64 {
        match self {
            StakeInput::RegularOutput(stake) => stake.output().value,
            StakeInput::PrivacyPool(stake) => stake.value,
        }
    }

    /// Public fingerprint hashed into the kernel: output index and txid for
    /// regular outputs, serial hash and denomination for privacy coins.
    pub fn uniqueness(&self) -> [u8; UNIQUENESS_LEN] {
        let mut out = [0u8; UNIQUENESS_LEN];
        match self {
            StakeInput::RegularOutput(stake) => {
                out[..4].copy_from_slice(&stake.prevout.index.to_le_bytes());
                out[4..].copy_from_slice(stake.prevout.hash.as_bytes());
            }
            StakeInput::PrivacyPool(stake) => {
                out[..32].copy_from_slice(stake.spend.serial_hash().as_bytes());
                out[32..].copy_from_slice(&stake.spend.denomination().to_le_bytes());
            }
        }
        out
    }

    /// Origin block: where the output was confirmed, or the accumulator
    /// checkpoint block a privacy proof commits to.
    pub fn index_from<'c>(&self, chain: &'c dyn ChainView) -> Result<&'c BlockIndexNode> {
        match self {
            StakeInput::RegularOutput(stake) => chain.by_hash(&stake.block_hash).ok_or_else(|| {
                PosError::ChainLookupFailed(format!("origin block {} not found", stake.block_hash))
            }),
            StakeInput::PrivacyPool(stake) => {
                let height = stake.spend.checkpoint_height();
                chain.by_height(height).ok_or_else(|| {
                    PosError::ChainLookupFailed(format!("origin block at height {} not found", height))
                })
            }
        }
    }

    /// Stake modifier governing this input's kernel
    pub fn modifier(&self, chain: &dyn ChainView, params: &ChainParams, epoch: ProtocolEpoch) -> Result<u64> {
        let from = self.index_from(chain)?;
        match self {
            StakeInput::RegularOutput(_) => {
                Ok(get_kernel_stake_modifier(&from.hash, epoch, chain, params)?.modifier)
            }
            StakeInput::PrivacyPool(stake) => stake.modifier(from, chain, params),
        }
    }

    /// Transaction holding the staked output; privacy coins have none
    pub fn tx_from(&self) -> Option<&Transaction> {
        match self {
            StakeInput::RegularOutput(stake) => Some(stake.tx_from()),
            StakeInput::PrivacyPool(_) => None,
        }
    }

    pub fn is_privacy(&self) -> bool {
        matches!(self, StakeInput::PrivacyPool(_))
    }
}
