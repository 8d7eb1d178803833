//! Proof-of-stake error taxonomy

use thiserror::Error;
use crate::crypto::Hash;
use crate::validation::ScriptError;

/// Result type alias for proof-of-stake operations
pub type Result<T> = std::result::Result<T, PosError>;

/// Errors raised while computing modifiers or validating stake kernels
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PosError {
    /// A required block or previous transaction is not known
    #[error("Chain lookup failed: {0}")]
    ChainLookupFailed(String),

    /// Stake time precedes the previous output's time or the minimum age
    #[error("Timestamp violation: {0}")]
    TimestampViolation(String),

    /// No generated stake modifier could be found behind a block
    #[error("Stake modifier unavailable: {0}")]
    ModifierUnavailable(String),

    /// Script or signature verification of the kernel input failed
    #[error("Coinstake signature invalid: {0}")]
    SignatureInvalid(#[from] ScriptError),

    /// The kernel hash does not clear the weighted target
    #[error("Kernel hash {hash} does not meet target")]
    KernelTargetNotMet {
        /// Computed proof-of-stake hash
        hash: Hash,
    },

    /// The modifier checksum disagrees with a hard checkpoint
    #[error("Stake modifier checksum {checksum:#010x} at height {height} does not match checkpoint {expected:#010x}")]
    ChecksumMismatch {
        height: u64,
        checksum: u32,
        expected: u32,
    },

    /// A privacy-pool spend declared a purpose other than staking
    #[error("Unsupported spend type: {0}")]
    UnsupportedSpendType(String),

    /// The block's second transaction is not a coinstake
    #[error("Transaction {0} is not a coinstake")]
    NotCoinstake(Hash),

    /// The privacy-pool spend could not be decoded
    #[error("Malformed privacy-pool spend: {0}")]
    MalformedSpend(String),
}

impl PosError {
    /// Lookups may succeed once more of the chain is known.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ChainLookupFailed(_))
    }

    /// Conditions that indicate a corrupt index or an irreconcilable fork
    /// rather than a bad candidate.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ModifierUnavailable(_) | Self::ChecksumMismatch { .. })
    }
}
