//! Reward curves.

use std::fmt;

/// Inputs a reward curve may look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardContext {
    pub height: u64,
    /// Stake of the submitting slot.
    pub slot_stake: u128,
    /// Stake across all slots.
    pub total_stake: u128,
}

/// Reward earned by a batch; also its contribution to branch weight.
pub trait RewardPolicy: fmt::Debug + Send + Sync {
    fn reward(&self, ctx: &RewardContext) -> u128;
}

/// Same reward for every batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantReward(pub u128);

impl RewardPolicy for ConstantReward {
    fn reward(&self, _ctx: &RewardContext) -> u128 {
        self.0
    }
}

/// Reward proportional to the submitting slot's share of total stake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakeWeightedReward {
    pub base: u128,
}

impl RewardPolicy for StakeWeightedReward {
    fn reward(&self, ctx: &RewardContext) -> u128 {
        if ctx.total_stake == 0 {
            return 0;
        }
        self.base
            .checked_mul(ctx.slot_stake)
            .map(|scaled| scaled / ctx.total_stake)
            .unwrap_or(self.base)
    }
}
