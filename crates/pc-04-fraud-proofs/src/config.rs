//! Fraud proof configuration.

use serde::{Deserialize, Serialize};

/// Penalties and reporter rewards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudConfig {
    /// Stake slashed for including a double spend (default: 50).
    pub double_spend_penalty: u128,

    /// Stake slashed for including a fabricated or replayed deposit (default: 50).
    pub invalid_deposit_penalty: u128,

    /// Percent of slot stake slashed for signing two batches on one parent (default: 50).
    pub height_conflict_penalty_percent: u8,

    /// Percent of the slashed amount paid to the reporter (default: 50).
    pub reporter_reward_percent: u8,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            double_spend_penalty: 50,
            invalid_deposit_penalty: 50,
            height_conflict_penalty_percent: 50,
            reporter_reward_percent: 50,
        }
    }
}

impl FraudConfig {
    /// `percent` of `amount`, rounded down.
    pub fn percent_of(amount: u128, percent: u8) -> u128 {
        amount / 100 * u128::from(percent) + amount % 100 * u128::from(percent) / 100
    }
}
