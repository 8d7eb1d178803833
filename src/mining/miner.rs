//! Stake miner implementation
//!
//! Searches a short window of future timestamps for a coinstake kernel that
//! meets the block target.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::consensus::{check_stake, ChainParams, HashTarget, PosError, Result};
use crate::constants::HASH_DRIFT;
use crate::crypto::Hash;
use crate::stake::StakeInput;
use crate::storage::ChainView;

/// Kernel search result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeSearchResult {
    /// Found a kernel meeting the target at `tx_time`
    Found { tx_time: u32, proof_hash: Hash },
    /// The tip moved or the miner was stopped
    Interrupted,
    /// No timestamp in the drift window hit the target
    Exhausted,
}

/// Last successful search: tip height it ran against and the wall-clock
/// time it hashed at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastHashed {
    pub height: u64,
    /// Unix seconds
    pub time: u64,
}

/// Stake miner
#[derive(Debug, Clone, Default)]
pub struct StakeMiner {
    /// Stop signal
    stop_signal: Arc<AtomicBool>,
    /// Advisory marker, may race between miner threads
    last_hashed: Arc<Mutex<Option<LastHashed>>>,
}

impl StakeMiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a stop signal handle
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_signal)
    }

    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.stop_signal.store(false, Ordering::SeqCst);
    }

    pub fn last_hashed(&self) -> Option<LastHashed> {
        self.last_hashed.lock().ok().and_then(|guard| *guard)
    }

    /// Try to find a kernel for `stake` at or shortly after `tx_time`.
    ///
    /// Returns the winning transaction time. Stops early when the tip height
    /// changes or the stop signal is raised.
    pub fn try_solve_kernel(
        &self,
        stake: &StakeInput,
        target_bits: u32,
        origin_time: u32,
        tx_time: u32,
        chain: &dyn ChainView,
        params: &ChainParams,
    ) -> Option<u32> {
        let stop = Arc::clone(&self.stop_signal);
        let cancel = move || stop.load(Ordering::SeqCst);
        match self.search_kernel(stake, target_bits, origin_time, tx_time, chain, params, cancel) {
            Ok(StakeSearchResult::Found { tx_time, .. }) => Some(tx_time),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("kernel search skipped: {}", e);
                None
            }
        }
    }

    /// Drift search with an explicit cancellation predicate, polled together
    /// with the tip height at the top of every iteration.
    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(level = "trace", skip(self, stake, chain, params, cancel))]
    pub fn search_kernel<F>(
        &self,
        stake: &StakeInput,
        target_bits: u32,
        origin_time: u32,
        tx_time: u32,
        chain: &dyn ChainView,
        params: &ChainParams,
        mut cancel: F,
    ) -> Result<StakeSearchResult>
    where
        F: FnMut() -> bool,
    {
        let start_height = chain.tip_height();
        let epoch = params.epoch_at(start_height + 1);

        if tx_time < origin_time {
            return Err(PosError::TimestampViolation(format!(
                "coinstake time {} precedes origin block time {}",
                tx_time, origin_time
            )));
        }
        let min_age = params.stake_min_age(epoch);
        if u64::from(tx_time) < u64::from(origin_time) + u64::from(min_age) {
            return Err(PosError::TimestampViolation(format!(
                "stake from {} has not reached the minimum age of {}s at {}",
                origin_time, min_age, tx_time
            )));
        }

        let modifier = stake.modifier(chain, params, epoch)?;
        let uniqueness = stake.uniqueness();
        let value = stake.value();
        let target = HashTarget::from_compact(target_bits);

        for i in 0..HASH_DRIFT {
            if cancel() || chain.tip_height() != start_height {
                tracing::trace!("kernel search interrupted at iteration {}", i);
                return Ok(StakeSearchResult::Interrupted);
            }

            let try_time = tx_time.saturating_add(HASH_DRIFT - i);
            let (hit, proof_hash) = check_stake(&uniqueness, value, modifier, &target, origin_time, try_time);
            if hit {
                if let Ok(mut last) = self.last_hashed.lock() {
                    let now = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map(|d| d.as_secs())
                        .unwrap_or_default();
                    *last = Some(LastHashed { height: start_height, time: now });
                }
                return Ok(StakeSearchResult::Found { tx_time: try_time, proof_hash });
            }
        }
        Ok(StakeSearchResult::Exhausted)
    }
}
