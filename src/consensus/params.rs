//! Chain parameters and protocol epochs
//!
//! Two stake protocols coexist: V1 for historical blocks and V2 from the
//! network's switch height onwards. The epoch is resolved once from a height
//! and passed down explicitly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::GENESIS_MODIFIER_CHECKSUM;

/// Parameter loading errors
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("Invalid parameters: {0}")]
    Invalid(String),
    #[error("Failed to parse parameters: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Stake protocol generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolEpoch {
    V1,
    V2,
}

/// Network the parameters belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    Main,
    Test,
    Regtest,
}

/// Read-only consensus parameters consumed by the stake core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    pub network: Network,
    /// Seconds between stake modifier recomputations (V1)
    pub modifier_interval_v1: u32,
    /// Seconds between stake modifier recomputations (V2)
    pub modifier_interval_v2: u32,
    pub target_spacing_v1: u32,
    pub target_spacing_v2: u32,
    /// Minimum age of a staked output, in seconds (V1)
    pub stake_min_age_v1: u32,
    /// Minimum age of a staked output, in seconds (V2)
    pub stake_min_age_v2: u32,
    /// First height governed by the V2 protocol
    pub switch_height: u64,
    /// First height at which coinstake witnesses are verified
    pub witness_height: u64,
    /// Blocks with a version at or below this use the V1 kernel
    pub legacy_block_version: u32,
    /// Low timestamp bits that must be zero for V1 coinstakes
    pub stake_timestamp_mask: u32,
    /// Seconds after the origin block before a privacy-pool stake's
    /// modifier is fixed
    pub privacy_modifier_delay: u32,
    /// Base units per whole coin
    pub coin: u64,
    /// Whether hard modifier checkpoints are enforced
    pub enforce_checkpoints: bool,
    /// Hard stake modifier checksum checkpoints by height
    pub modifier_checkpoints: BTreeMap<u64, u32>,
}

impl ChainParams {
    pub fn mainnet() -> Self {
        Self {
            network: Network::Main,
            modifier_interval_v1: 10 * 60,
            modifier_interval_v2: 60,
            target_spacing_v1: 64,
            target_spacing_v2: 60,
            stake_min_age_v1: 8 * 60 * 60,
            stake_min_age_v2: 60 * 60,
            switch_height: 250_000,
            witness_height: 300_000,
            legacy_block_version: 7,
            stake_timestamp_mask: 0xf,
            privacy_modifier_delay: 60 * 60,
            coin: 100_000_000,
            enforce_checkpoints: true,
            modifier_checkpoints: BTreeMap::from([(0, GENESIS_MODIFIER_CHECKSUM)]),
        }
    }

    pub fn testnet() -> Self {
        Self {
            network: Network::Test,
            modifier_interval_v1: 2 * 60,
            switch_height: 1_000,
            witness_height: 1_500,
            enforce_checkpoints: false,
            ..Self::mainnet()
        }
    }

    /// Parameters for local test chains: V2 from genesis, short ages.
    pub fn regtest() -> Self {
        Self {
            network: Network::Regtest,
            modifier_interval_v1: 60,
            stake_min_age_v1: 60,
            stake_min_age_v2: 60,
            switch_height: 0,
            witness_height: 0,
            privacy_modifier_delay: 60,
            enforce_checkpoints: false,
            modifier_checkpoints: BTreeMap::new(),
            ..Self::mainnet()
        }
    }

    /// Load parameters from JSON and validate them
    pub fn from_json(json: &str) -> Result<Self, ParamsError> {
        let params: ChainParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.modifier_interval_v1 == 0 || self.modifier_interval_v2 == 0 {
            return Err(ParamsError::Invalid("modifier interval must be non-zero".into()));
        }
        if self.target_spacing_v1 == 0 || self.target_spacing_v2 == 0 {
            return Err(ParamsError::Invalid("target spacing must be non-zero".into()));
        }
        if self.coin == 0 {
            return Err(ParamsError::Invalid("coin unit must be non-zero".into()));
        }
        Ok(())
    }

    /// Protocol epoch governing a block at `height`
    pub fn epoch_at(&self, height: u64) -> ProtocolEpoch {
        if height >= self.switch_height {
            ProtocolEpoch::V2
        } else {
            ProtocolEpoch::V1
        }
    }

    pub fn modifier_interval(&self, epoch: ProtocolEpoch) -> u32 {
        match epoch {
            ProtocolEpoch::V1 => self.modifier_interval_v1,
            ProtocolEpoch::V2 => self.modifier_interval_v2,
        }
    }

    pub fn target_spacing(&self, epoch: ProtocolEpoch) -> u32 {
        match epoch {
            ProtocolEpoch::V1 => self.target_spacing_v1,
            ProtocolEpoch::V2 => self.target_spacing_v2,
        }
    }

    pub fn stake_min_age(&self, epoch: ProtocolEpoch) -> u32 {
        match epoch {
            ProtocolEpoch::V1 => self.stake_min_age_v1,
            ProtocolEpoch::V2 => self.stake_min_age_v2,
        }
    }

    pub fn switch_height(&self) -> u64 {
        self.switch_height
    }

    pub fn modifier_checkpoints(&self) -> &BTreeMap<u64, u32> {
        &self.modifier_checkpoints
    }

    /// Whether coinstake witnesses are verified at `height`
    pub fn witness_active(&self, height: u64) -> bool {
        height >= self.witness_height
    }
}

impl Default for ChainParams {
    fn default() -> Self {
        Self::mainnet()
    }
}
