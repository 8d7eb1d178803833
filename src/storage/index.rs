//! Arena-backed block index
//!
//! Nodes live in a vector and refer to their parent by `NodeId`, so walks
//! are plain index lookups and a shared reference is a consistent snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::crypto::Hash;
use crate::storage::ChainView;

/// Block index flag: proof-of-stake block
pub const BLOCK_PROOF_OF_STAKE: u32 = 1 << 0;
/// Block index flag: entropy bit
pub const BLOCK_STAKE_ENTROPY: u32 = 1 << 1;
/// Block index flag: generated a new stake modifier
pub const BLOCK_STAKE_MODIFIER: u32 = 1 << 2;

/// Arena index of a block node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Location of a block body in storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub file: u32,
    pub offset: u64,
}

/// One entry of the block index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockIndexNode {
    pub id: NodeId,
    pub hash: Hash,
    pub parent: Option<NodeId>,
    pub height: u64,
    /// Block time (seconds since Unix epoch)
    pub time: u32,
    pub version: u32,
    pub pos: BlockPos,
    pub proof_of_stake: bool,
    /// Entropy bit contributed to stake modifiers (0 or 1)
    pub entropy_bit: u8,
    /// Kernel hash of a proof-of-stake block, zero for proof-of-work
    pub proof_hash: Hash,
    pub stake_modifier: u64,
    pub generated_stake_modifier: bool,
    /// 256-bit modifier consumed by the V1 kernel
    pub stake_modifier_v2: Hash,
    pub stake_modifier_checksum: u32,
    /// Privacy-pool accumulator checkpoint committed by this block
    pub accumulator_checkpoint: Hash,
    modifier_set: bool,
}

impl BlockIndexNode {
    /// A proof-of-work node; the entropy bit is the low bit of the hash.
    pub fn new(hash: Hash, time: u32) -> Self {
        Self {
            id: NodeId(0),
            hash,
            parent: None,
            height: 0,
            time,
            version: 1,
            pos: BlockPos::default(),
            proof_of_stake: false,
            entropy_bit: hash.0[0] & 1,
            proof_hash: Hash::zero(),
            stake_modifier: 0,
            generated_stake_modifier: false,
            stake_modifier_v2: Hash::zero(),
            stake_modifier_checksum: 0,
            accumulator_checkpoint: Hash::zero(),
            modifier_set: false,
        }
    }

    pub fn with_proof_of_stake(mut self, proof_hash: Hash) -> Self {
        self.proof_of_stake = true;
        self.proof_hash = proof_hash;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_pos(mut self, pos: BlockPos) -> Self {
        self.pos = pos;
        self
    }

    pub fn with_entropy_bit(mut self, bit: u8) -> Self {
        self.entropy_bit = bit & 1;
        self
    }

    pub fn with_accumulator_checkpoint(mut self, checkpoint: Hash) -> Self {
        self.accumulator_checkpoint = checkpoint;
        self
    }

    /// Block time widened for interval arithmetic
    pub fn block_time(&self) -> i64 {
        i64::from(self.time)
    }

    /// Flag word hashed into the modifier checksum
    pub fn flags(&self) -> u32 {
        let mut flags = 0;
        if self.proof_of_stake {
            flags |= BLOCK_PROOF_OF_STAKE;
        }
        if self.entropy_bit == 1 {
            flags |= BLOCK_STAKE_ENTROPY;
        }
        if self.generated_stake_modifier {
            flags |= BLOCK_STAKE_MODIFIER;
        }
        flags
    }

    /// Whether the stake modifier has already been assigned
    pub fn has_stake_modifier(&self) -> bool {
        self.modifier_set
    }
}

/// In-memory block index with an active chain
#[derive(Debug, Default, Clone)]
pub struct BlockIndexArena {
    nodes: Vec<BlockIndexNode>,
    by_hash: HashMap<Hash, NodeId>,
    active: Vec<NodeId>,
}

impl BlockIndexArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert `node` as a child of `parent` (or as genesis) without touching
    /// the active chain. Returns the existing id for a known hash.
    pub fn insert(&mut self, mut node: BlockIndexNode, parent: Option<NodeId>) -> NodeId {
        if let Some(id) = self.by_hash.get(&node.hash) {
            return *id;
        }
        let id = NodeId(self.nodes.len());
        node.id = id;
        node.parent = parent;
        node.height = parent
            .and_then(|p| self.nodes.get(p.0))
            .map_or(0, |p| p.height + 1);
        self.by_hash.insert(node.hash, id);
        self.nodes.push(node);
        id
    }

    /// Append `node` on top of the active tip and make it the new tip
    pub fn append(&mut self, node: BlockIndexNode) -> NodeId {
        let parent = self.active.last().copied();
        let id = self.insert(node, parent);
        self.active.push(id);
        id
    }

    /// Re-point the active chain at `tip`, following parent links
    pub fn set_active_tip(&mut self, tip: NodeId) {
        let mut chain = Vec::new();
        let mut cursor = self.nodes.get(tip.0);
        while let Some(node) = cursor {
            chain.push(node.id);
            cursor = node.parent.and_then(|p| self.nodes.get(p.0));
        }
        chain.reverse();
        self.active = chain;
    }

    pub fn tip(&self) -> Option<&BlockIndexNode> {
        self.active.last().and_then(|id| self.nodes.get(id.0))
    }

    /// Assign the stake modifier once; later calls are ignored.
    /// Returns whether the node was updated.
    pub fn set_stake_modifier(&mut self, id: NodeId, modifier: u64, generated: bool) -> bool {
        match self.nodes.get_mut(id.0) {
            Some(node) if !node.modifier_set => {
                node.stake_modifier = modifier;
                node.generated_stake_modifier = generated;
                node.modifier_set = true;
                true
            }
            _ => false,
        }
    }

    pub fn set_stake_modifier_v2(&mut self, id: NodeId, modifier: Hash) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.stake_modifier_v2 = modifier;
        }
    }

    pub fn set_stake_modifier_checksum(&mut self, id: NodeId, checksum: u32) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.stake_modifier_checksum = checksum;
        }
    }
}

impl ChainView for BlockIndexArena {
    fn node(&self, id: NodeId) -> Option<&BlockIndexNode> {
        self.nodes.get(id.0)
    }

    fn by_hash(&self, hash: &Hash) -> Option<&BlockIndexNode> {
        self.by_hash.get(hash).and_then(|id| self.nodes.get(id.0))
    }

    fn by_height(&self, height: u64) -> Option<&BlockIndexNode> {
        let id = self.active.get(usize::try_from(height).ok()?)?;
        self.nodes.get(id.0)
    }

    fn tip_height(&self) -> u64 {
        self.active.len().saturating_sub(1) as u64
    }
}
