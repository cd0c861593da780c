//! Error types for fraud proofs

use pc_01_merkle_codec::MerkleError;
use pc_03_chain_graph::ChainError;
use shared_types::LedgerError;

/// Fraud proof error types
///
/// Every rejection leaves graph, registry and ledger untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FraudError {
    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    #[error("Conflict already reported")]
    AlreadyReported,

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("Ledger rejected operation: {0}")]
    Ledger(#[from] LedgerError),
}

impl FraudError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        FraudError::InvalidProof(reason.into())
    }
}

impl From<MerkleError> for FraudError {
    fn from(err: MerkleError) -> Self {
        FraudError::InvalidProof(err.to_string())
    }
}

/// Result type for fraud proof operations
pub type FraudResult<T> = Result<T, FraudError>;
