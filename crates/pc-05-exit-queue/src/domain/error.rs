//! Error types for the exit queue

use pc_01_merkle_codec::MerkleError;
use shared_types::{Address, AssetError, Color, ColorKind, Hash, LedgerError};

/// Exit queue error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExitError {
    #[error("Unregistered color: {0}")]
    UnknownColor(Color),

    #[error("No {0:?} colors left")]
    ColorsExhausted(ColorKind),

    #[error("Token {0:?} already has a color")]
    TokenRegistered(Address),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("Batch {0:?} is not canonical")]
    NotCanonical(Hash),

    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    #[error("Proof does not match the committed root")]
    ProofMismatch,

    #[error("Caller is not the owner")]
    NotOwner,

    #[error("Exit {0:?} already exists")]
    ExitExists(Hash),

    #[error("Unknown exit: {0:?}")]
    UnknownExit(Hash),

    #[error("Exit {0:?} is not pending")]
    NotPending(Hash),

    #[error("Exit {0:?} already finalized")]
    AlreadyFinalized(Hash),

    #[error("Exit {0:?} is already tokenized")]
    AlreadyTokenized(Hash),

    #[error("Exit {0:?} has no receipt")]
    NoReceipt(Hash),

    #[error("Exit {0:?} is not finalized yet")]
    NotFinalized(Hash),

    #[error("Receipt for exit {0:?} already redeemed")]
    AlreadyRedeemed(Hash),

    #[error("Ledger rejected operation: {0}")]
    Ledger(#[from] LedgerError),
}

impl From<MerkleError> for ExitError {
    fn from(err: MerkleError) -> Self {
        match err {
            MerkleError::ProofMismatch => ExitError::ProofMismatch,
            other => ExitError::InvalidProof(other.to_string()),
        }
    }
}

/// Result type for exit queue operations
pub type ExitResult<T> = Result<T, ExitError>;
