//! Batch arena nodes.

use serde::{Deserialize, Serialize};
use shared_types::{Address, Hash, SlotId, ZERO_ADDRESS, ZERO_HASH};

/// Hash of the genesis batch; first batches use it as their parent.
pub const GENESIS_HASH: Hash = ZERO_HASH;

/// Lifecycle of a batch in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Live,
    /// Proven fraudulent, or a descendant of such a batch.
    Invalid,
    /// Orphan removed by `prune`; kept as a tombstone so ancestry walks work.
    Pruned,
}

/// A submitted batch ("period").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchNode {
    pub hash: Hash,
    pub parent_hash: Hash,
    pub height: u64,
    pub merkle_root: Hash,
    pub slot_id: SlotId,
    pub signer: Address,
    /// Slot owner at submission time; receives the reward.
    pub beneficiary: Address,
    /// Root-chain block number at submission.
    pub submitted_at: u64,
    pub reward: u128,
    /// Cumulative reward of the branch ending here.
    pub weight: u128,
    pub status: BatchStatus,
    /// Arrival order; decides ties.
    pub sequence: u64,
}

impl BatchNode {
    pub fn genesis() -> Self {
        Self {
            hash: GENESIS_HASH,
            parent_hash: GENESIS_HASH,
            height: 0,
            merkle_root: ZERO_HASH,
            slot_id: 0,
            signer: ZERO_ADDRESS,
            beneficiary: ZERO_ADDRESS,
            submitted_at: 0,
            reward: 0,
            weight: 0,
            status: BatchStatus::Live,
            sequence: 0,
        }
    }

    pub fn is_live(&self) -> bool {
        self.status == BatchStatus::Live
    }
}

/// Per-slot aggregate over a branch segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotCounter {
    pub slot_id: SlotId,
    pub batches: u64,
    pub reward: u128,
}

/// Sum of rewards across counters.
pub fn total_reward(counters: &[SlotCounter]) -> u128 {
    counters
        .iter()
        .fold(0u128, |acc, counter| acc.saturating_add(counter.reward))
}
