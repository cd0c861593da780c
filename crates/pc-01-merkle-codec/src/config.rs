//! Merkle codec configuration.

use serde::{Deserialize, Serialize};

use crate::domain::{MerkleError, MAX_TREE_DEPTH};

/// Configuration shared by the transaction tree and the validator tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MerkleConfig {
    /// Depth of both trees; capacity is `2^tree_depth` leaves (default: 16).
    pub tree_depth: u32,
}

impl Default for MerkleConfig {
    fn default() -> Self {
        Self { tree_depth: 16 }
    }
}

impl MerkleConfig {
    /// Reject depths the codec cannot address.
    pub fn validate(&self) -> Result<(), MerkleError> {
        if self.tree_depth == 0 || self.tree_depth > MAX_TREE_DEPTH {
            return Err(MerkleError::InvalidDepth(self.tree_depth));
        }
        Ok(())
    }

    /// Number of addressable leaves.
    pub fn capacity(&self) -> u64 {
        1u64.checked_shl(self.tree_depth).unwrap_or(u64::MAX)
    }
}
