//! Slot registry configuration.

use serde::{Deserialize, Serialize};
use shared_types::Color;

/// Auction, epoch and heartbeat parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotRegistryConfig {
    /// Number of slots, and batches per epoch (default: 4).
    pub epoch_length: u32,

    /// Epochs a queued bid or logout waits before `activate` (default: 2).
    pub activation_delay: u64,

    /// Lowest accepted stake (default: 1).
    pub min_stake: u128,

    /// Batches one slot may submit per epoch (default: 4).
    pub max_submissions_per_epoch: u32,

    /// Completed epochs a slot's submission counters are kept for. Batches
    /// in older epochs are refused (default: 8).
    pub submission_window: u64,

    /// Color stakes and heartbeat bonds are paid in (default: color 0).
    pub stake_color: Color,

    /// Bond a heartbeat challenger escrows (default: 10).
    pub heartbeat_bond: u128,

    /// Root blocks an operator has to answer a heartbeat challenge (default: 100).
    pub heartbeat_window: u64,

    /// Stake slashed from a slot that misses a heartbeat challenge (default: 10).
    pub heartbeat_penalty: u128,
}

impl Default for SlotRegistryConfig {
    fn default() -> Self {
        Self {
            epoch_length: 4,
            activation_delay: 2,
            min_stake: 1,
            max_submissions_per_epoch: 4,
            submission_window: 8,
            stake_color: Color(0),
            heartbeat_bond: 10,
            heartbeat_window: 100,
            heartbeat_penalty: 10,
        }
    }
}
