//! Read-only collaborator interfaces consumed by the stake core
//!
//! The node owns and synchronizes these; the core only reads through them
//! and never holds global chain state of its own.

use crate::consensus::Block;
use crate::crypto::Hash;
use crate::storage::{BlockIndexNode, BlockPos, NodeId};
use crate::validation::Transaction;

/// Navigable view of the block index and the active chain.
///
/// Implementations must present a consistent snapshot for the duration of
/// a single call into the core.
pub trait ChainView {
    /// Node by arena id, on any branch
    fn node(&self, id: NodeId) -> Option<&BlockIndexNode>;

    /// Node by block hash, on any branch
    fn by_hash(&self, hash: &Hash) -> Option<&BlockIndexNode>;

    /// Node at `height` on the active chain
    fn by_height(&self, height: u64) -> Option<&BlockIndexNode>;

    /// Height of the active chain tip
    fn tip_height(&self) -> u64;

    fn active_chain_contains(&self, hash: &Hash) -> bool {
        self.by_hash(hash)
            .and_then(|node| self.by_height(node.height))
            .map_or(false, |active| active.hash == *hash)
    }

    fn parent(&self, node: &BlockIndexNode) -> Option<&BlockIndexNode> {
        node.parent.and_then(|id| self.node(id))
    }
}

/// Raw block storage
pub trait BlockStore {
    fn read_block(&self, pos: BlockPos) -> Option<Block>;
}

/// Transaction index: transaction and the hash of the block containing it
pub trait TransactionLookup {
    fn get_transaction(&self, txid: &Hash) -> Option<(Transaction, Hash)>;
}
