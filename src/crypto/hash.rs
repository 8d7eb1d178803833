//! Double SHA-256 hashing and the consensus serialization stream
//!
//! Every consensus hash (kernel, selection, checksum, modifier) is a double
//! SHA-256 over little-endian serialized fields, written through `HashWriter`.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// 32-byte hash output
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// Create a zero hash (used for genesis previous hash)
    pub const fn zero() -> Self {
        Hash([0u8; 32])
    }

    /// Create hash from bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    /// Create hash from hex string
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Hash(arr))
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Interpret the hash as a 256-bit little-endian integer.
    pub fn to_u256(&self) -> U256 {
        U256::from_little_endian(&self.0)
    }

    /// Inverse of [`Hash::to_u256`].
    pub fn from_u256(value: U256) -> Self {
        let mut bytes = [0u8; 32];
        value.to_little_endian(&mut bytes);
        Hash(bytes)
    }

    /// Low 64 bits of the little-endian integer value.
    pub fn low_u64(&self) -> u64 {
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.0[..8]);
        u64::from_le_bytes(word)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for Hash {
    fn default() -> Self {
        Self::zero()
    }
}

/// Double SHA-256 of arbitrary bytes
pub fn hash256(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    Hash(second.into())
}

/// Streaming serializer that feeds consensus fields into a double SHA-256.
///
/// Integers are written little-endian, hashes as their raw 32 bytes and
/// byte strings without a length prefix.
#[derive(Clone, Default)]
pub struct HashWriter {
    inner: Sha256,
}

impl HashWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u32(mut self, value: u32) -> Self {
        self.inner.update(value.to_le_bytes());
        self
    }

    pub fn write_u64(mut self, value: u64) -> Self {
        self.inner.update(value.to_le_bytes());
        self
    }

    pub fn write_hash(mut self, hash: &Hash) -> Self {
        self.inner.update(hash.0);
        self
    }

    pub fn write_bytes(mut self, bytes: &[u8]) -> Self {
        self.inner.update(bytes);
        self
    }

    /// Length-prefixed (u32) byte string, used for scripts.
    pub fn write_var_bytes(self, bytes: &[u8]) -> Self {
        self.write_u32(bytes.len() as u32).write_bytes(bytes)
    }

    pub fn finish(self) -> Hash {
        let first = self.inner.finalize();
        let second = Sha256::digest(first);
        Hash(second.into())
    }
}
