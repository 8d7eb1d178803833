//! Block database using Sled
//!
//! Stores block bodies by position and indexes their transactions so the
//! proof-of-stake checker can resolve spent outputs and origin blocks.

use sled::{Db, Tree};
use thiserror::Error;

use crate::consensus::Block;
use crate::crypto::Hash;
use crate::storage::{BlockPos, BlockStore, TransactionLookup};
use crate::validation::Transaction;

/// Block database errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Db(#[from] sled::Error),
    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Database wrapper
#[derive(Debug, Clone)]
pub struct BlockDb {
    db: Db,
    blocks_tree: Tree,
    tx_tree: Tree,
}

impl BlockDb {
    /// Open or create the database
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, StorageError> {
        Self::from_db(sled::open(path)?)
    }

    /// Throwaway database removed on drop
    pub fn temporary() -> Result<Self, StorageError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StorageError> {
        let blocks_tree = db.open_tree("blocks")?;
        let tx_tree = db.open_tree("txindex")?;
        Ok(Self { db, blocks_tree, tx_tree })
    }

    /// Append a block body and index its transactions
    pub fn write_block(&self, block: &Block) -> Result<BlockPos, StorageError> {
        let pos = BlockPos { file: 0, offset: self.db.generate_id()? };
        self.blocks_tree.insert(pos_key(pos), bincode::serialize(block)?)?;

        let block_hash = block.hash();
        for tx in &block.transactions {
            let entry = bincode::serialize(&(tx, block_hash))?;
            self.tx_tree.insert(tx.hash().0, entry)?;
        }
        self.db.flush()?;
        Ok(pos)
    }

    pub fn get_block(&self, pos: BlockPos) -> Result<Option<Block>, StorageError> {
        match self.blocks_tree.get(pos_key(pos))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_indexed_transaction(&self, txid: &Hash) -> Result<Option<(Transaction, Hash)>, StorageError> {
        match self.tx_tree.get(txid.0)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn pos_key(pos: BlockPos) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[..4].copy_from_slice(&pos.file.to_be_bytes());
    key[4..].copy_from_slice(&pos.offset.to_be_bytes());
    key
}

impl BlockStore for BlockDb {
    fn read_block(&self, pos: BlockPos) -> Option<Block> {
        self.get_block(pos).unwrap_or_else(|e| {
            tracing::warn!("failed to read block at {:?}: {}", pos, e);
            None
        })
    }
}

impl TransactionLookup for BlockDb {
    fn get_transaction(&self, txid: &Hash) -> Option<(Transaction, Hash)> {
        self.get_indexed_transaction(txid).unwrap_or_else(|e| {
            tracing::warn!("failed to read transaction {}: {}", txid, e);
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::BlockHeader;

    fn block(time: u32) -> Block {
        let header = BlockHeader::new(8, Hash::zero(), Hash::zero(), time, 0x1e0fffff, 0);
        Block::new(header, vec![Transaction::coinbase(time, 50, vec![3u8; 32])])
    }

    #[test]
    fn test_block_roundtrip() {
        let db = BlockDb::temporary().unwrap();
        let b = block(1_000);
        let pos = db.write_block(&b).unwrap();

        assert_eq!(db.read_block(pos), Some(b));
    }

    #[test]
    fn test_positions_are_distinct() {
        let db = BlockDb::temporary().unwrap();
        let p1 = db.write_block(&block(1)).unwrap();
        let p2 = db.write_block(&block(2)).unwrap();
        assert_ne!(p1, p2);
        assert_eq!(db.read_block(p2).unwrap().header.time, 2);
    }

    #[test]
    fn test_transaction_index_points_at_block() {
        let db = BlockDb::temporary().unwrap();
        let b = block(5);
        db.write_block(&b).unwrap();

        let txid = b.transactions[0].hash();
        let (tx, block_hash) = db.get_transaction(&txid).unwrap();
        assert_eq!(tx, b.transactions[0]);
        assert_eq!(block_hash, b.hash());
    }

    #[test]
    fn test_missing_entries() {
        let db = BlockDb::temporary().unwrap();
        assert!(db.read_block(BlockPos { file: 0, offset: 99 }).is_none());
        assert!(db.get_transaction(&Hash::zero()).is_none());
    }
}
