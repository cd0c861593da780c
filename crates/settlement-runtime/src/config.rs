//! # Settlement Configuration
//!
//! One TOML document configures every subsystem. Missing sections and keys
//! fall back to their defaults.
//!
//! ```toml
//! [merkle]
//! tree_depth = 16
//!
//! [slots]
//! epoch_length = 4
//! activation_delay = 2
//!
//! [chain]
//! reward_policy = "stake_weighted"
//!
//! [exits]
//! exit_duration = 100
//! bond_policy = "burn"
//!
//! [governance]
//! min_delay = 50
//! ```
//!
//! `PC_EXIT_DURATION` and `PC_EPOCH_LENGTH` override the file.

use std::fs;
use std::path::Path;

use pc_01_merkle_codec::MerkleConfig;
use pc_02_slot_registry::SlotRegistryConfig;
use pc_03_chain_graph::ChainGraphConfig;
use pc_04_fraud_proofs::FraudConfig;
use pc_05_exit_queue::ExitQueueConfig;
use serde::{Deserialize, Serialize};
use shared_types::{Color, ColorKind};
use tracing::info;

/// Environment variable overriding `exits.exit_duration`.
pub const ENV_EXIT_DURATION: &str = "PC_EXIT_DURATION";
/// Environment variable overriding `slots.epoch_length`.
pub const ENV_EPOCH_LENGTH: &str = "PC_EPOCH_LENGTH";

/// Timelock parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Root blocks between proposing and applying a parameter change (default: 50).
    pub min_delay: u64,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self { min_delay: 50 }
    }
}

/// Complete settlement configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    pub merkle: MerkleConfig,
    pub slots: SlotRegistryConfig,
    pub chain: ChainGraphConfig,
    pub fraud: FraudConfig,
    pub exits: ExitQueueConfig,
    pub governance: GovernanceConfig,
}

/// Errors that can occur while loading or checking configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("{var} has invalid value {value:?}")]
    InvalidEnv { var: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl SettlementConfig {
    /// Load from a TOML file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        let mut config = Self::parse(&content)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without touching the environment.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `PC_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply `PC_*` overrides from an arbitrary lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ENV_EXIT_DURATION) {
            self.exits.exit_duration = parse_env(ENV_EXIT_DURATION, &value)?;
            info!("[runtime] exit_duration = {} from environment", self.exits.exit_duration);
        }
        if let Some(value) = lookup(ENV_EPOCH_LENGTH) {
            self.slots.epoch_length = parse_env(ENV_EPOCH_LENGTH, &value)?;
            info!("[runtime] epoch_length = {} from environment", self.slots.epoch_length);
        }
        Ok(())
    }

    /// Reject inconsistent values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.merkle
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.slots.epoch_length == 0 {
            return Err(invalid("slots.epoch_length must be positive"));
        }
        if u64::from(self.slots.epoch_length) > self.merkle.capacity() {
            return Err(invalid("slots.epoch_length exceeds the validator tree capacity"));
        }
        if self.slots.max_submissions_per_epoch == 0 {
            return Err(invalid("slots.max_submissions_per_epoch must be positive"));
        }
        if self.slots.min_stake == 0 {
            return Err(invalid("slots.min_stake must be positive"));
        }
        if self.chain.finality_depth > self.chain.consensus_horizon {
            return Err(invalid("chain.finality_depth exceeds chain.consensus_horizon"));
        }
        if self.fraud.reporter_reward_percent > 100 || self.fraud.height_conflict_penalty_percent > 100 {
            return Err(invalid("fraud percentages must be at most 100"));
        }
        if self.exits.exit_duration == 0 {
            return Err(invalid("exits.exit_duration must be positive"));
        }
        for (name, color) in [
            ("slots.stake_color", self.slots.stake_color),
            ("chain.reward_color", self.chain.reward_color),
            ("exits.bond_color", self.exits.bond_color),
        ] {
            if color.kind() != ColorKind::Fungible {
                return Err(invalid(&format!("{name} ({color}) is not fungible")));
            }
        }
        Ok(())
    }

    /// Color slashed stake accrues in.
    pub fn treasury_color(&self) -> Color {
        self.slots.stake_color
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid(reason.to_string())
}
