//! Compact hash targets and coin weighting
//!
//! Targets travel in the 32-bit compact form (1 byte exponent, 3 byte
//! mantissa with a sign bit) and are expanded to 256 bits for comparison.
//! Products wrap modulo 2^256, matching the historical 256-bit integer type.

use primitive_types::U256;

use crate::consensus::ProtocolEpoch;
use crate::constants::COIN_DAY_WEIGHT_DIVISOR;
use crate::crypto::Hash;

/// Sign bit of the compact mantissa
const COMPACT_SIGN_BIT: u32 = 0x0080_0000;

/// Expanded 256-bit hash target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct HashTarget(U256);

impl HashTarget {
    pub fn new(value: U256) -> Self {
        Self(value)
    }

    /// Expand a compact target
    pub fn from_compact(compact: u32) -> Self {
        Self(expand_compact(compact))
    }

    pub fn value(&self) -> U256 {
        self.0
    }

    pub fn to_compact(&self) -> u32 {
        compress_target(self.0)
    }

    /// Target scaled by the staked amount
    pub fn weighted(&self, coin_value: u64, epoch: ProtocolEpoch) -> U256 {
        weighted_target(self.0, coin_value, epoch)
    }
}

/// Expand a compact target to 256 bits.
///
/// A negative mantissa or an exponent past 32 bytes still expands (the sign
/// is dropped, overflowing bits are lost); consensus code only ever
/// compares against the expanded value.
pub fn expand_compact(compact: u32) -> U256 {
    let size = compact >> 24;
    let word = compact & 0x007f_ffff;

    if size <= 3 {
        U256::from(word >> (8 * (3 - size)))
    } else {
        let shift = 8 * (size - 3) as usize;
        if shift >= 256 {
            U256::zero()
        } else {
            U256::from(word) << shift
        }
    }
}

/// Whether the compact encoding has its sign bit set on a non-zero mantissa
pub fn compact_is_negative(compact: u32) -> bool {
    compact & 0x007f_ffff != 0 && compact & COMPACT_SIGN_BIT != 0
}

/// Compress a 256-bit target into compact form
pub fn compress_target(target: U256) -> u32 {
    let mut size = (target.bits() + 7) / 8;
    let mut compact = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        (target >> (8 * (size - 3))).low_u32()
    };

    // Keep the mantissa positive
    if compact & COMPACT_SIGN_BIT != 0 {
        compact >>= 8;
        size += 1;
    }

    compact | ((size as u32) << 24)
}

/// Coin-weighted target.
///
/// V1 multiplies the target by the raw value. V2 first divides the value by
/// a fixed normalization factor of 100 and multiplies by the result.
pub fn weighted_target(target: U256, coin_value: u64, epoch: ProtocolEpoch) -> U256 {
    match epoch {
        ProtocolEpoch::V1 => target.overflowing_mul(U256::from(coin_value)).0,
        ProtocolEpoch::V2 => {
            let weight = U256::from(coin_value) / U256::from(COIN_DAY_WEIGHT_DIVISOR);
            weight.overflowing_mul(target).0
        }
    }
}

/// V2 comparison: strictly below the weighted target
pub fn stake_target_hit(proof_hash: &Hash, coin_value: u64, target: &HashTarget) -> bool {
    proof_hash.to_u256() < target.weighted(coin_value, ProtocolEpoch::V2)
}

/// V1 comparison: at or below the already weighted target
pub fn stake_target_hit_v1(proof_hash: &Hash, weighted: U256) -> bool {
    proof_hash.to_u256() <= weighted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_known_targets() {
        assert_eq!(expand_compact(0x1d00ffff), U256::from(0xffffu64) << 208);
        assert_eq!(expand_compact(0x03123456), U256::from(0x123456u64));
        assert_eq!(expand_compact(0x02123456), U256::from(0x1234u64));
        assert_eq!(expand_compact(0x01123456), U256::from(0x12u64));
        assert_eq!(expand_compact(0), U256::zero());
    }

    #[test]
    fn test_expand_drops_sign_bit() {
        assert!(compact_is_negative(0x04923456));
        assert_eq!(expand_compact(0x04923456), U256::from(0x123456u64) << 8);
        assert!(!compact_is_negative(0x04800000));
    }

    #[test]
    fn test_expand_overflowing_exponent_is_zero() {
        assert_eq!(expand_compact(0xff123456), U256::zero());
    }

    #[test]
    fn test_compress_roundtrip_on_canonical_values() {
        for compact in [0x1d00ffffu32, 0x1b0404cb, 0x1e0fffff, 0x03123456] {
            assert_eq!(compress_target(expand_compact(compact)), compact);
        }
    }

    #[test]
    fn test_compress_avoids_sign_bit() {
        let compact = compress_target(U256::from(0x80u64));
        assert_eq!(compact, 0x02008000);
        assert_eq!(expand_compact(compact), U256::from(0x80u64));
    }

    #[test]
    fn test_v1_weight_multiplies_raw_value() {
        let target = U256::from(1_000u64);
        assert_eq!(weighted_target(target, 7, ProtocolEpoch::V1), U256::from(7_000u64));
    }

    #[test]
    fn test_v2_weight_divides_value_by_hundred_first() {
        let target = U256::from(1_000u64);
        assert_eq!(weighted_target(target, 799, ProtocolEpoch::V2), U256::from(7_000u64));
        // Below one hundred units the weight truncates to zero
        assert_eq!(weighted_target(target, 99, ProtocolEpoch::V2), U256::zero());
    }

    #[test]
    fn test_weight_wraps_modulo_2_256() {
        let wrapped = weighted_target(U256::MAX, 2, ProtocolEpoch::V1);
        assert_eq!(wrapped, U256::MAX - U256::one());
    }

    #[test]
    fn test_equal_hash_asymmetry() {
        let target = HashTarget::new(U256::from(12_345u64));
        let hash = Hash::from_u256(target.weighted(100, ProtocolEpoch::V2));
        assert!(!stake_target_hit(&hash, 100, &target));
        assert!(stake_target_hit_v1(&hash, target.weighted(1, ProtocolEpoch::V1)));
    }
}
