//! Stake modifier chain
//!
//! The stake modifier is a 64-bit value recomputed once per modifier
//! interval. Each of its bits is the entropy bit of one block picked from a
//! window of recent history, so an owner cannot know at confirmation time
//! which modifier will later hash with their output.

use std::collections::HashSet;

use primitive_types::U256;

use crate::consensus::{ChainParams, PosError, ProtocolEpoch, Result};
use crate::constants::{MODIFIER_INTERVAL_RATIO, MODIFIER_SELECTION_ROUNDS};
use crate::crypto::{Hash, HashWriter};
use crate::storage::{BlockIndexArena, BlockIndexNode, ChainView, NodeId};

/// Upper bound on the up-front candidate reservation
const MAX_CANDIDATE_RESERVE: i64 = 4096;

/// Modifier that governs kernels of outputs confirmed in a given block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoverningModifier {
    pub modifier: u64,
    /// Height of the block that generated it
    pub height: u64,
    /// Time of the block that generated it
    pub time: i64,
}

/// Length of selection round `section` in seconds.
///
/// Early rounds get longer sections; later rounds converge on the interval
/// length.
pub fn selection_interval_section(modifier_interval: u32, section: u32) -> i64 {
    debug_assert!(section < MODIFIER_SELECTION_ROUNDS);
    let interval = i64::from(modifier_interval);
    let section = i64::from(section);
    interval * 63 / (63 + (63 - section) * (MODIFIER_INTERVAL_RATIO - 1))
}

/// Total selection window: the sum of all 64 sections
pub fn selection_interval(modifier_interval: u32) -> i64 {
    (0..MODIFIER_SELECTION_ROUNDS)
        .map(|section| selection_interval_section(modifier_interval, section))
        .sum()
}

/// Nearest modifier-generating block at or behind `start`, as
/// `(modifier, generation time)`.
fn last_stake_modifier(start: &BlockIndexNode, chain: &dyn ChainView) -> Result<(u64, i64)> {
    let mut node = start;
    while !node.generated_stake_modifier {
        match chain.parent(node) {
            Some(parent) => node = parent,
            None => break,
        }
    }
    if !node.generated_stake_modifier {
        return Err(PosError::ModifierUnavailable(format!(
            "no modifier generation at or behind block {}",
            start.hash
        )));
    }
    Ok((node.stake_modifier, node.block_time()))
}

/// Selection hash of a candidate; proof-of-stake blocks are shifted right
/// by 32 bits so they always beat proof-of-work blocks.
pub(crate) fn selection_hash(node: &BlockIndexNode, modifier_prev: u64, modifier_v2: bool) -> U256 {
    let proof = if modifier_v2 { node.hash } else { node.proof_hash };
    let hash = HashWriter::new()
        .write_hash(&proof)
        .write_u64(modifier_prev)
        .finish()
        .to_u256();
    if node.proof_of_stake {
        hash >> 32
    } else {
        hash
    }
}

/// Pick the candidate with the lowest selection hash among those not yet
/// selected and timestamped up to `selection_stop`.
///
/// The hashing protocol is fixed for the whole scan by the height of the
/// earliest candidate.
pub(crate) fn select_block_from_candidates<'c>(
    chain: &'c dyn ChainView,
    sorted_by_timestamp: &[(i64, Hash)],
    selected: &HashSet<Hash>,
    selection_stop: i64,
    modifier_prev: u64,
    switch_height: u64,
) -> Result<&'c BlockIndexNode> {
    let mut best: Option<(U256, &'c BlockIndexNode)> = None;
    let mut modifier_v2: Option<bool> = None;

    for (_, hash) in sorted_by_timestamp {
        let node = chain.by_hash(hash).ok_or_else(|| {
            PosError::ChainLookupFailed(format!("no block index for selection candidate {}", hash))
        })?;
        if best.is_some() && node.block_time() > selection_stop {
            break;
        }

        let use_v2 = *modifier_v2.get_or_insert(node.height >= switch_height);
        if selected.contains(&node.hash) {
            continue;
        }

        let hash_selection = selection_hash(node, modifier_prev, use_v2);
        match best {
            Some((best_hash, _)) if hash_selection >= best_hash => {}
            _ => best = Some((hash_selection, node)),
        }
    }

    best.map(|(_, node)| node)
        .ok_or_else(|| PosError::ModifierUnavailable("no selectable candidate block".into()))
}

/// Compute the stake modifier for the child of `parent`.
///
/// Returns `(modifier, generated)`; `generated` is false when the modifier
/// is inherited from the current interval.
pub fn compute_next_stake_modifier(
    parent: Option<&BlockIndexNode>,
    chain: &dyn ChainView,
    params: &ChainParams,
) -> Result<(u64, bool)> {
    let Some(parent) = parent else {
        // genesis block's modifier is 0
        return Ok((0, true));
    };
    if parent.height == 0 {
        return Ok((0, false));
    }
    if parent.height == 1 {
        return Ok((u64::from(parent.entropy_bit) << 1, true));
    }

    let epoch = params.epoch_at(parent.height + 1);
    let modifier_interval = params.modifier_interval(epoch);
    if modifier_interval == 0 {
        return Err(PosError::ModifierUnavailable(format!(
            "zero modifier interval for {:?}",
            epoch
        )));
    }
    let interval = i64::from(modifier_interval);

    let (last_modifier, modifier_time) = last_stake_modifier(parent, chain)?;
    tracing::trace!(
        "prev modifier={:#018x} time={} at height {}",
        last_modifier,
        modifier_time,
        parent.height
    );
    if modifier_time / interval >= parent.block_time() / interval {
        return Ok((last_modifier, false));
    }

    let spacing = i64::from(params.target_spacing(epoch)).max(1);
    let selection_window = selection_interval(modifier_interval);
    let selection_start = (parent.block_time() / interval) * interval - selection_window;

    let mut candidates: Vec<(i64, Hash)> =
        Vec::with_capacity((64 * interval / spacing).clamp(0, MAX_CANDIDATE_RESERVE) as usize);
    let mut cursor = Some(parent);
    while let Some(node) = cursor {
        if node.block_time() < selection_start {
            break;
        }
        candidates.push((node.block_time(), node.hash));
        cursor = chain.parent(node);
    }
    // Oldest first, then a stable sort on time alone
    candidates.reverse();
    candidates.sort_by_key(|(time, _)| *time);

    let rounds = candidates.len().min(MODIFIER_SELECTION_ROUNDS as usize);
    let mut new_modifier = 0u64;
    let mut selection_stop = selection_start;
    let mut selected = HashSet::with_capacity(rounds);

    for round in 0..rounds {
        selection_stop += selection_interval_section(modifier_interval, round as u32);
        let node = select_block_from_candidates(
            chain,
            &candidates,
            &selected,
            selection_stop,
            last_modifier,
            params.switch_height(),
        )
        .map_err(|e| {
            tracing::warn!("unable to select block at round {}: {}", round, e);
            e
        })?;

        new_modifier |= u64::from(node.entropy_bit) << round;
        selected.insert(node.hash);
        tracing::trace!(
            "selected round {} stop={} height={} bit={}",
            round,
            selection_stop,
            node.height,
            node.entropy_bit
        );
    }

    tracing::debug!(
        "new stake modifier={:#018x} from {} candidates at height {}",
        new_modifier,
        candidates.len(),
        parent.height + 1
    );
    Ok((new_modifier, true))
}

/// Find the modifier that governs kernels of outputs confirmed in
/// `origin_hash`: the modifier in force one selection window after the
/// origin block, walking forward along the active chain.
pub fn get_kernel_stake_modifier(
    origin_hash: &Hash,
    epoch: ProtocolEpoch,
    chain: &dyn ChainView,
    params: &ChainParams,
) -> Result<GoverningModifier> {
    let from = chain
        .by_hash(origin_hash)
        .ok_or_else(|| PosError::ChainLookupFailed(format!("block {} not indexed", origin_hash)))?;

    let selection_window = selection_interval(params.modifier_interval(epoch));
    let mut modifier_height = from.height;
    let mut modifier_time = from.block_time();
    let mut node = from;

    while modifier_time < from.block_time() + selection_window {
        let next = chain.by_height(node.height + 1).ok_or_else(|| {
            PosError::ChainLookupFailed(format!(
                "stake modifier for block {} not yet reached at tip {}",
                origin_hash,
                chain.tip_height()
            ))
        })?;
        node = next;
        if node.generated_stake_modifier {
            modifier_height = node.height;
            modifier_time = node.block_time();
        }
    }

    Ok(GoverningModifier {
        modifier: node.stake_modifier,
        height: modifier_height,
        time: modifier_time,
    })
}

/// 256-bit stake modifier: `Hash(kernel ‖ prev.stake_modifier_v2)`, zero
/// for genesis.
pub fn compute_stake_modifier_v2(prev: Option<&BlockIndexNode>, kernel: &Hash) -> Hash {
    match prev {
        None => Hash::zero(),
        Some(prev) => HashWriter::new()
            .write_hash(kernel)
            .write_hash(&prev.stake_modifier_v2)
            .finish(),
    }
}

/// Rolling checksum over the modifier chain, used for hard checkpoints
pub fn stake_modifier_checksum(node: &BlockIndexNode, chain: &dyn ChainView) -> u32 {
    let mut writer = HashWriter::new();
    if let Some(prev) = chain.parent(node) {
        writer = writer.write_u32(prev.stake_modifier_checksum);
    }
    let hash = writer
        .write_u32(node.flags())
        .write_hash(&node.proof_hash)
        .write_u64(node.stake_modifier)
        .finish();
    (hash.to_u256() >> (256 - 32)).low_u32()
}

/// Whether `checksum` agrees with the hard checkpoint at `height`.
/// Heights without a checkpoint, and networks that do not enforce them,
/// always agree.
pub fn verify_checksum_against_checkpoint(params: &ChainParams, height: u64, checksum: u32) -> bool {
    if !params.enforce_checkpoints {
        return true;
    }
    params
        .modifier_checkpoints()
        .get(&height)
        .map_or(true, |expected| *expected == checksum)
}

pub fn check_stake_modifier_checkpoint(params: &ChainParams, height: u64, checksum: u32) -> Result<()> {
    if verify_checksum_against_checkpoint(params, height, checksum) {
        return Ok(());
    }
    let expected = params.modifier_checkpoints().get(&height).copied().unwrap_or_default();
    tracing::warn!(
        "stake modifier checksum {:#010x} at height {} rejected by checkpoint {:#010x}",
        checksum,
        height,
        expected
    );
    Err(PosError::ChecksumMismatch { height, checksum, expected })
}

/// Assign the stake modifier, its 256-bit companion and the checksum to a
/// freshly connected block, enforcing hard checkpoints.
///
/// `kernel` is the block hash for proof-of-work blocks and the kernel
/// input's prevout hash for proof-of-stake blocks. Calling this again on an
/// already connected node re-checks and returns the stored checksum. A node
/// that fails its checkpoint is left untouched.
pub fn connect_stake_modifier(
    arena: &mut BlockIndexArena,
    id: NodeId,
    kernel: &Hash,
    params: &ChainParams,
) -> Result<u32> {
    let node = arena
        .node(id)
        .ok_or_else(|| PosError::ChainLookupFailed(format!("unknown block node {:?}", id)))?;
    if node.has_stake_modifier() {
        check_stake_modifier_checkpoint(params, node.height, node.stake_modifier_checksum)?;
        return Ok(node.stake_modifier_checksum);
    }

    let parent = arena.parent(node);
    let (modifier, generated) = compute_next_stake_modifier(parent, &*arena, params)?;
    let modifier_v2 = compute_stake_modifier_v2(parent, kernel);

    let mut connected = node.clone();
    connected.stake_modifier = modifier;
    connected.generated_stake_modifier = generated;
    let checksum = stake_modifier_checksum(&connected, &*arena);
    check_stake_modifier_checkpoint(params, connected.height, checksum)?;

    arena.set_stake_modifier(id, modifier, generated);
    arena.set_stake_modifier_v2(id, modifier_v2);
    arena.set_stake_modifier_checksum(id, checksum);
    Ok(checksum)
}
