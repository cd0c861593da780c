//! Error types for the chain graph

use pc_02_slot_registry::SlotError;
use shared_types::{Hash, LedgerError};

/// Chain graph error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("Unknown parent batch: {0:?}")]
    UnknownParent(Hash),

    #[error("Unknown batch: {0:?}")]
    UnknownBatch(Hash),

    #[error("Batch already submitted: {0:?}")]
    DuplicateBatch(Hash),

    #[error("Invalid batch signature")]
    InvalidSignature,

    #[error("Batch {0:?} is not canonical")]
    NotCanonical(Hash),

    #[error("Batch {0:?} is already invalid")]
    AlreadyInvalid(Hash),

    #[error("Reward for batch {0:?} already claimed")]
    AlreadyClaimed(Hash),

    #[error("Caller is not the beneficiary of batch {0:?}")]
    NotBeneficiary(Hash),

    #[error("Not yet eligible: depth {depth}, required {required}")]
    NotYetEligible { depth: u64, required: u64 },

    #[error("Prune rejected: {0}")]
    PruneRejected(String),

    #[error("Batch {0:?} is referenced by a live exit")]
    ExitReferenced(Hash),

    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    #[error("Light head is not the current tip")]
    NotTip,

    #[error("Heavy branch ({heavy}) does not outweigh light branch ({light})")]
    NotHeavier { heavy: u128, light: u128 },

    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error("Ledger rejected operation: {0}")]
    Ledger(#[from] LedgerError),
}

/// Result type for chain graph operations
pub type ChainResult<T> = Result<T, ChainError>;
