//! Chain graph configuration.

use serde::{Deserialize, Serialize};
use shared_types::Color;

use crate::domain::{ConstantReward, RewardPolicy, StakeWeightedReward};

/// Which reward curve batches earn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardPolicyKind {
    /// Every batch earns `block_reward`.
    Constant,
    /// A batch earns `block_reward * slot_stake / total_stake`.
    StakeWeighted,
}

/// Fork-choice, pruning and reward parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainGraphConfig {
    /// Depth below the tip a divergence point must reach before pruning (default: 10).
    pub consensus_horizon: u64,

    /// Depth below the tip a batch must reach before its reward is claimable (default: 4).
    pub finality_depth: u64,

    /// Upper bound on any single batch reward (default: 1_000).
    pub reward_cap: u128,

    /// Base reward per batch (default: 1).
    pub block_reward: u128,

    /// Reward curve (default: constant).
    pub reward_policy: RewardPolicyKind,

    /// Paid to a successful light-branch reporter, from the treasury (default: 5).
    pub light_branch_reward: u128,

    /// Color rewards are minted in (default: color 0).
    pub reward_color: Color,
}

impl Default for ChainGraphConfig {
    fn default() -> Self {
        Self {
            consensus_horizon: 10,
            finality_depth: 4,
            reward_cap: 1_000,
            block_reward: 1,
            reward_policy: RewardPolicyKind::Constant,
            light_branch_reward: 5,
            reward_color: Color(0),
        }
    }
}

impl ChainGraphConfig {
    /// Instantiate the configured reward curve.
    pub fn build_policy(&self) -> Box<dyn RewardPolicy> {
        match self.reward_policy {
            RewardPolicyKind::Constant => Box::new(ConstantReward(self.block_reward)),
            RewardPolicyKind::StakeWeighted => Box::new(StakeWeightedReward {
                base: self.block_reward,
            }),
        }
    }
}
