//! Proof-of-Stake Kernel Core Library
//!
//! Stake modifier chain, kernel hashing and coinstake validation for a
//! UTXO chain with Schnorr-locked outputs and a privacy coin pool.
//!
//! The library holds no chain state of its own: every entry point takes a
//! `ChainView` plus the storage and script collaborators it needs.

pub mod consensus;
pub mod crypto;
pub mod validation;
pub mod storage;
pub mod stake;
pub mod mining;

/// Protocol constants - HARD-CODED, NEVER CONFIGURABLE
pub mod constants {
    /// Ratio of the first to the last selection section length
    pub const MODIFIER_INTERVAL_RATIO: i64 = 3;

    /// Selection rounds per stake modifier (one per modifier bit)
    pub const MODIFIER_SELECTION_ROUNDS: u32 = 64;

    /// Timestamps tried by one kernel search
    pub const HASH_DRIFT: u32 = 30;

    /// V2 coin weight divisor applied to the staked value
    pub const COIN_DAY_WEIGHT_DIVISOR: u64 = 100;

    /// Stake modifier checksum of the main network genesis block
    pub const GENESIS_MODIFIER_CHECKSUM: u32 = 0xfd11_f4e7;
}
