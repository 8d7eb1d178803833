//! Kernel hash construction and target checks
//!
//! A kernel is the hash that binds a staked output to a moment in time. Both
//! generations hash fixed-width little-endian fields through `HashWriter`.

use crate::consensus::{
    stake_target_hit, stake_target_hit_v1, ChainParams, HashTarget, PosError, ProtocolEpoch, Result,
};
use crate::crypto::{Hash, HashWriter};
use crate::validation::OutPoint;

/// V2 kernel: `Hash(modifier ‖ origin_time ‖ uniqueness ‖ tx_time)`
pub fn kernel_hash(modifier: u64, origin_time: u32, uniqueness: &[u8], tx_time: u32) -> Hash {
    HashWriter::new()
        .write_u64(modifier)
        .write_u32(origin_time)
        .write_bytes(uniqueness)
        .write_u32(tx_time)
        .finish()
}

/// V1 kernel over the 256-bit modifier and the spent outpoint
pub fn kernel_hash_v1(modifier_v2: &Hash, prev_time: u32, prevout: &OutPoint, tx_time: u32) -> Hash {
    HashWriter::new()
        .write_hash(modifier_v2)
        .write_u32(prev_time)
        .write_hash(&prevout.hash)
        .write_u32(prevout.index)
        .write_u32(tx_time)
        .finish()
}

/// V2 check. Returns whether the kernel is strictly below the weighted
/// target, together with the kernel hash.
pub fn check_stake(
    uniqueness: &[u8],
    coin_value: u64,
    modifier: u64,
    target: &HashTarget,
    origin_time: u32,
    tx_time: u32,
) -> (bool, Hash) {
    let proof_hash = kernel_hash(modifier, origin_time, uniqueness, tx_time);
    let hit = stake_target_hit(&proof_hash, coin_value, target);
    if hit {
        tracing::debug!(
            "kernel hit: modifier={:#018x} origin_time={} tx_time={} hash={}",
            modifier,
            origin_time,
            tx_time,
            proof_hash
        );
    }
    (hit, proof_hash)
}

/// V1 check against the raw-value weighted target (`≤`).
///
/// Fails when the coinstake predates the output it spends.
pub fn check_stake_v1(
    prev_time: u32,
    prevout: &OutPoint,
    tx_time: u32,
    target: &HashTarget,
    coin_value: u64,
    modifier_v2: &Hash,
) -> Result<(bool, Hash)> {
    if tx_time < prev_time {
        return Err(PosError::TimestampViolation(format!(
            "coinstake time {} precedes spent output time {}",
            tx_time, prev_time
        )));
    }

    let weighted = target.weighted(coin_value, ProtocolEpoch::V1);
    let proof_hash = kernel_hash_v1(modifier_v2, prev_time, prevout, tx_time);
    tracing::debug!(
        "v1 kernel: modifier={} prev_time={} prevout={}:{} tx_time={} hash={}",
        modifier_v2,
        prev_time,
        prevout.hash,
        prevout.index,
        tx_time,
        proof_hash
    );
    Ok((stake_target_hit_v1(&proof_hash, weighted), proof_hash))
}

/// Coinstake timestamp rule: the transaction time equals the block time,
/// and V1 additionally requires the masked low bits to be zero.
pub fn check_coinstake_timestamp(epoch: ProtocolEpoch, block_time: i64, tx_time: i64, params: &ChainParams) -> bool {
    match epoch {
        ProtocolEpoch::V2 => block_time == tx_time,
        ProtocolEpoch::V1 => {
            block_time == tx_time && (tx_time & i64::from(params.stake_timestamp_mask)) == 0
        }
    }
}

/// Weight of an output held from `begin` to `end`, net of the minimum age
pub fn stake_weight(begin: i64, end: i64, epoch: ProtocolEpoch, params: &ChainParams) -> i64 {
    end - begin - i64::from(params.stake_min_age(epoch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash256;
    use primitive_types::U256;

    fn outpoint() -> OutPoint {
        OutPoint::new(hash256(b"prev tx"), 1)
    }

    #[test]
    fn test_kernel_hash_layout() {
        let uniqueness = [7u8; 36];
        let mut data = Vec::new();
        data.extend_from_slice(&42u64.to_le_bytes());
        data.extend_from_slice(&1_000u32.to_le_bytes());
        data.extend_from_slice(&uniqueness);
        data.extend_from_slice(&2_000u32.to_le_bytes());

        assert_eq!(kernel_hash(42, 1_000, &uniqueness, 2_000), hash256(&data));
    }

    #[test]
    fn test_kernel_hash_depends_on_every_field() {
        let base = kernel_hash(1, 2, &[3; 36], 4);
        assert_ne!(base, kernel_hash(9, 2, &[3; 36], 4));
        assert_ne!(base, kernel_hash(1, 9, &[3; 36], 4));
        assert_ne!(base, kernel_hash(1, 2, &[9; 36], 4));
        assert_ne!(base, kernel_hash(1, 2, &[3; 36], 9));
    }

    #[test]
    fn test_v1_kernel_layout() {
        let modifier = hash256(b"modifier");
        let prevout = outpoint();
        let mut data = Vec::new();
        data.extend_from_slice(modifier.as_bytes());
        data.extend_from_slice(&500u32.to_le_bytes());
        data.extend_from_slice(prevout.hash.as_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&900u32.to_le_bytes());

        assert_eq!(kernel_hash_v1(&modifier, 500, &prevout, 900), hash256(&data));
    }

    #[test]
    fn test_check_stake_against_extreme_targets() {
        let easy = HashTarget::new(U256::MAX);
        let (hit, _) = check_stake(&[1; 36], 1_000, 5, &easy, 10, 20);
        assert!(hit);

        let impossible = HashTarget::from_compact(0);
        let (hit, hash) = check_stake(&[1; 36], 1_000, 5, &impossible, 10, 20);
        assert!(!hit);
        assert_eq!(hash, kernel_hash(5, 10, &[1; 36], 20));
    }

    #[test]
    fn test_v1_rejects_time_travel() {
        let target = HashTarget::new(U256::MAX);
        let result = check_stake_v1(1_000, &outpoint(), 999, &target, 1, &Hash::zero());
        assert!(matches!(result, Err(PosError::TimestampViolation(_))));
    }

    #[test]
    fn test_v1_equal_times_allowed() {
        let target = HashTarget::new(U256::MAX);
        let (hit, _) = check_stake_v1(1_000, &outpoint(), 1_000, &target, 1, &Hash::zero()).unwrap();
        assert!(hit);
    }

    #[test]
    fn test_coinstake_timestamp_rule() {
        let params = ChainParams::mainnet();
        assert!(check_coinstake_timestamp(ProtocolEpoch::V2, 1_001, 1_001, &params));
        assert!(!check_coinstake_timestamp(ProtocolEpoch::V2, 1_001, 1_000, &params));
        assert!(check_coinstake_timestamp(ProtocolEpoch::V1, 1_008, 1_008, &params));
        assert!(!check_coinstake_timestamp(ProtocolEpoch::V1, 1_001, 1_001, &params));
    }

    #[test]
    fn test_stake_weight_subtracts_min_age() {
        let params = ChainParams::mainnet();
        assert_eq!(stake_weight(0, 10_000, ProtocolEpoch::V2, &params), 10_000 - 3_600);
        assert_eq!(stake_weight(0, 3_000, ProtocolEpoch::V1, &params), 3_000 - 28_800);
    }
}
