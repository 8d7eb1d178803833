//! Privacy-pool spends
//!
//! A privacy-pool spend replaces a plain prevout with a zero-knowledge proof
//! of ownership of a minted coin. The proof itself is validated elsewhere;
//! staking only needs the declared purpose, the serial hash, the
//! denomination and the accumulator checkpoint the proof was made against.

use serde::{Deserialize, Serialize};
use crate::consensus::PosError;
use crate::crypto::Hash;
use crate::validation::{TxIn, PRIVACY_SPEND_MARKER};

/// Denominations a privacy-pool coin may carry (whole coins)
pub const DENOMINATIONS: [u32; 8] = [1, 5, 10, 50, 100, 500, 1000, 5000];

/// What a spend is allowed to be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpendPurpose {
    /// Ordinary transfer out of the pool
    Transfer,
    /// Re-mint into the pool
    Mint,
    /// Kernel input of a coinstake
    Stake,
}

/// Parsed privacy-pool spend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacyPoolSpend {
    purpose: SpendPurpose,
    serial_hash: Hash,
    denomination: u32,
    /// Height of the accumulator checkpoint the proof commits to
    checkpoint_height: u64,
    /// Opaque proof bytes
    proof: Vec<u8>,
}

impl PrivacyPoolSpend {
    pub fn new(
        purpose: SpendPurpose,
        serial_hash: Hash,
        denomination: u32,
        checkpoint_height: u64,
        proof: Vec<u8>,
    ) -> Self {
        Self { purpose, serial_hash, denomination, checkpoint_height, proof }
    }

    /// Parse the spend carried by a transaction input
    pub fn from_tx_in(input: &TxIn) -> Result<Self, PosError> {
        let payload = match input.script_sig.split_first() {
            Some((&PRIVACY_SPEND_MARKER, rest)) => rest,
            _ => return Err(PosError::MalformedSpend("input is not a privacy-pool spend".into())),
        };
        let spend: PrivacyPoolSpend = bincode::deserialize(payload)
            .map_err(|e| PosError::MalformedSpend(e.to_string()))?;
        if !DENOMINATIONS.contains(&spend.denomination) {
            return Err(PosError::MalformedSpend(format!(
                "unknown denomination {}",
                spend.denomination
            )));
        }
        Ok(spend)
    }

    /// Encode as an unlocking script
    pub fn to_script_sig(&self) -> Result<Vec<u8>, PosError> {
        let payload = bincode::serialize(self).map_err(|e| PosError::MalformedSpend(e.to_string()))?;
        let mut script = Vec::with_capacity(payload.len() + 1);
        script.push(PRIVACY_SPEND_MARKER);
        script.extend(payload);
        Ok(script)
    }

    pub fn purpose(&self) -> SpendPurpose {
        self.purpose
    }

    pub fn serial_hash(&self) -> Hash {
        self.serial_hash
    }

    pub fn denomination(&self) -> u32 {
        self.denomination
    }

    pub fn checkpoint_height(&self) -> u64 {
        self.checkpoint_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash256;
    use crate::validation::OutPoint;

    #[test]
    fn test_parse_roundtrip_through_input() {
        let spend = PrivacyPoolSpend::new(SpendPurpose::Stake, hash256(b"serial"), 100, 42, vec![9; 16]);
        let input = TxIn::new(OutPoint::null(), spend.to_script_sig().unwrap());

        assert!(input.is_privacy_spend());
        let parsed = PrivacyPoolSpend::from_tx_in(&input).unwrap();
        assert_eq!(parsed, spend);
    }

    #[test]
    fn test_rejects_plain_input() {
        let input = TxIn::new(OutPoint::new(hash256(b"tx"), 0), vec![1, 2, 3]);
        assert!(matches!(
            PrivacyPoolSpend::from_tx_in(&input),
            Err(PosError::MalformedSpend(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_denomination() {
        let spend = PrivacyPoolSpend::new(SpendPurpose::Stake, hash256(b"serial"), 7, 42, vec![]);
        let input = TxIn::new(OutPoint::null(), spend.to_script_sig().unwrap());
        assert!(matches!(
            PrivacyPoolSpend::from_tx_in(&input),
            Err(PosError::MalformedSpend(_))
        ));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let input = TxIn::new(OutPoint::null(), vec![PRIVACY_SPEND_MARKER, 1]);
        assert!(PrivacyPoolSpend::from_tx_in(&input).is_err());
    }
}
