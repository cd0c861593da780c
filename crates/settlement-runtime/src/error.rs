//! Errors surfaced by the settlement facade.

use pc_01_merkle_codec::MerkleError;
use pc_02_slot_registry::SlotError;
use pc_03_chain_graph::ChainError;
use pc_04_fraud_proofs::FraudError;
use pc_05_exit_queue::ExitError;
use shared_types::{Address, Hash, LedgerError};

use crate::config::ConfigError;

/// Coarse classification of a rejected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller may not do this.
    Authorization,
    /// Not allowed in the current state (too early, duplicate, exhausted).
    State,
    /// A proof, signature or reference does not check out.
    Proof,
    /// Not enough stake, balance or custody.
    Economic,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Fraud(#[from] FraudError),

    #[error(transparent)]
    Exit(#[from] ExitError),

    #[error("Ledger rejected operation: {0}")]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0:?} is not the admin")]
    NotAdmin(Address),

    #[error("Unknown batch: {0:?}")]
    UnknownBatch(Hash),
}

impl SettlementError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SettlementError::Merkle(_) => ErrorCategory::Proof,
            SettlementError::Slot(err) => slot_category(err),
            SettlementError::Chain(err) => chain_category(err),
            SettlementError::Fraud(err) => match err {
                FraudError::InvalidProof(_) => ErrorCategory::Proof,
                FraudError::AlreadyReported => ErrorCategory::State,
                FraudError::Chain(inner) => chain_category(inner),
                FraudError::Ledger(_) => ErrorCategory::Economic,
            },
            SettlementError::Exit(err) => exit_category(err),
            SettlementError::Ledger(_) => ErrorCategory::Economic,
            SettlementError::Config(_) => ErrorCategory::State,
            SettlementError::NotAdmin(_) => ErrorCategory::Authorization,
            SettlementError::UnknownBatch(_) => ErrorCategory::Proof,
        }
    }
}

fn slot_category(err: &SlotError) -> ErrorCategory {
    match err {
        SlotError::UnauthorizedSigner { .. } | SlotError::NotOwner(_) => ErrorCategory::Authorization,
        SlotError::InvalidProof(_) | SlotError::ProofMismatch | SlotError::UnknownSlot(_) => {
            ErrorCategory::Proof
        }
        SlotError::StakeTooLow { .. } | SlotError::Ledger(_) => ErrorCategory::Economic,
        SlotError::NotYetEligible { .. }
        | SlotError::NothingPending(_)
        | SlotError::InertSlot(_)
        | SlotError::EpochExhausted { .. }
        | SlotError::EpochClosed { .. }
        | SlotError::TakeoverPending(_)
        | SlotError::LoggingOut(_)
        | SlotError::AlreadyChallenged(_)
        | SlotError::UnknownChallenge(_)
        | SlotError::SlotsOccupied => ErrorCategory::State,
    }
}

fn chain_category(err: &ChainError) -> ErrorCategory {
    match err {
        ChainError::Slot(inner) => slot_category(inner),
        ChainError::Ledger(_) => ErrorCategory::Economic,
        ChainError::NotBeneficiary(_) => ErrorCategory::Authorization,
        ChainError::UnknownParent(_)
        | ChainError::UnknownBatch(_)
        | ChainError::InvalidSignature
        | ChainError::InvalidProof(_) => ErrorCategory::Proof,
        ChainError::DuplicateBatch(_)
        | ChainError::NotCanonical(_)
        | ChainError::AlreadyInvalid(_)
        | ChainError::AlreadyClaimed(_)
        | ChainError::NotYetEligible { .. }
        | ChainError::PruneRejected(_)
        | ChainError::ExitReferenced(_)
        | ChainError::NotTip
        | ChainError::NotHeavier { .. } => ErrorCategory::State,
    }
}

fn exit_category(err: &ExitError) -> ErrorCategory {
    match err {
        ExitError::NotOwner => ErrorCategory::Authorization,
        ExitError::InvalidProof(_)
        | ExitError::ProofMismatch
        | ExitError::NotCanonical(_)
        | ExitError::UnknownColor(_)
        | ExitError::Asset(_) => ErrorCategory::Proof,
        ExitError::Ledger(_) => ErrorCategory::Economic,
        ExitError::ColorsExhausted(_)
        | ExitError::TokenRegistered(_)
        | ExitError::ExitExists(_)
        | ExitError::UnknownExit(_)
        | ExitError::NotPending(_)
        | ExitError::AlreadyFinalized(_)
        | ExitError::AlreadyTokenized(_)
        | ExitError::NoReceipt(_)
        | ExitError::NotFinalized(_)
        | ExitError::AlreadyRedeemed(_) => ErrorCategory::State,
    }
}

pub type SettlementResult<T> = Result<T, SettlementError>;
