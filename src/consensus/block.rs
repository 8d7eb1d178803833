//! Block structure as seen by proof-of-stake validation

use serde::{Deserialize, Serialize};
use crate::crypto::{Hash, HashWriter};
use crate::validation::Transaction;

/// Block header containing all metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    /// Protocol version; versions above the legacy cutoff use the V2 kernel
    pub version: u32,
    /// Hash of the previous block
    pub prev_hash: Hash,
    /// Merkle root of all transactions
    pub merkle_root: Hash,
    /// Block timestamp (seconds since Unix epoch)
    pub time: u32,
    /// Target (compact representation)
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn new(
        version: u32,
        prev_hash: Hash,
        merkle_root: Hash,
        time: u32,
        bits: u32,
        nonce: u32,
    ) -> Self {
        Self {
            version,
            prev_hash,
            merkle_root,
            time,
            bits,
            nonce,
        }
    }

    /// Calculate the hash of this header
    pub fn hash(&self) -> Hash {
        HashWriter::new()
            .write_u32(self.version)
            .write_hash(&self.prev_hash)
            .write_hash(&self.merkle_root)
            .write_u32(self.time)
            .write_u32(self.bits)
            .write_u32(self.nonce)
            .finish()
    }
}

/// A complete block containing header and transactions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self { header, transactions }
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn is_genesis(&self) -> bool {
        self.header.prev_hash == Hash::zero()
    }

    /// The coinstake sits in the second slot, right after the coinbase
    pub fn coinstake(&self) -> Option<&Transaction> {
        self.transactions.get(1).filter(|tx| tx.is_coinstake())
    }

    pub fn is_proof_of_stake(&self) -> bool {
        self.coinstake().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash256;
    use crate::validation::{OutPoint, TxIn, TxOut};

    fn header() -> BlockHeader {
        BlockHeader::new(8, Hash::zero(), Hash::zero(), 1_600_000_000, 0x1e0fffff, 0)
    }

    #[test]
    fn test_header_hash_changes_with_time() {
        let a = header();
        let mut b = header();
        b.time += 1;
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), header().hash());
    }

    #[test]
    fn test_genesis_block_detection() {
        let block = Block::new(header(), vec![]);
        assert!(block.is_genesis());
        assert!(!block.is_proof_of_stake());
    }

    #[test]
    fn test_proof_of_stake_detection() {
        let coinbase = Transaction::coinbase(10, 0, vec![]);
        let coinstake = Transaction::new(
            10,
            vec![TxIn::new(OutPoint::new(hash256(b"prev"), 0), vec![])],
            vec![TxOut::empty(), TxOut::new(5, vec![0u8; 32])],
        );
        let block = Block::new(header(), vec![coinbase.clone(), coinstake]);
        assert!(block.is_proof_of_stake());

        let pow = Block::new(header(), vec![coinbase]);
        assert!(pow.coinstake().is_none());
    }
}
