//! Exit queue configuration.

use serde::{Deserialize, Serialize};
use shared_types::Color;

/// What happens to the bond of a successfully challenged exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondPolicy {
    /// Paid to the challenger.
    #[default]
    ToChallenger,
    /// Kept in bridge custody.
    Burn,
}

/// Exit game parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitQueueConfig {
    /// Root blocks between starting an exit and finalizing it (default: 100).
    pub exit_duration: u64,

    /// Bond posted with every exit (default: 10).
    pub exit_bond: u128,

    /// Color bonds and bought-exit prices are paid in (default: color 0).
    pub bond_color: Color,

    pub bond_policy: BondPolicy,

    /// Exits finalized per color as a side effect of a batch submission (default: 8).
    pub max_exits_per_submission: usize,
}

impl Default for ExitQueueConfig {
    fn default() -> Self {
        Self {
            exit_duration: 100,
            exit_bond: 10,
            bond_color: Color(0),
            bond_policy: BondPolicy::ToChallenger,
            max_exits_per_submission: 8,
        }
    }
}
