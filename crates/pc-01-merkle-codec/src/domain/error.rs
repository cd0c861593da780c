//! Error types for the Merkle codec

use thiserror::Error;

/// Merkle codec error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    #[error("Malformed proof: {0}")]
    InvalidProof(String),

    #[error("Recomputed root does not match the committed root")]
    ProofMismatch,

    #[error("Tree depth {0} out of range")]
    InvalidDepth(u32),

    #[error("Index {index} outside tree capacity {capacity}")]
    IndexOutOfRange { index: u64, capacity: u64 },

    #[error("Batch full: capacity {capacity}")]
    BatchFull { capacity: u64 },

    #[error("No leaf at index {0}")]
    UnknownLeaf(u64),
}

impl MerkleError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        MerkleError::InvalidProof(reason.into())
    }
}

/// Result type for Merkle codec operations
pub type MerkleResult<T> = Result<T, MerkleError>;
