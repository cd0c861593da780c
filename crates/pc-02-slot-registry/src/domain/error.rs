//! Error types for the slot registry

use pc_01_merkle_codec::MerkleError;
use shared_types::{Address, LedgerError, SlotId};

/// Slot registry error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("Unknown slot: {0}")]
    UnknownSlot(SlotId),

    #[error("Stake too low: offered {offered}, required {required}")]
    StakeTooLow { offered: u128, required: u128 },

    #[error("Caller is not the owner of slot {0}")]
    NotOwner(SlotId),

    #[error("Not yet eligible: at {now}, ready at {ready_at}")]
    NotYetEligible { now: u64, ready_at: u64 },

    #[error("Nothing to activate for slot {0}")]
    NothingPending(SlotId),

    #[error("Slot {0} has no stake")]
    InertSlot(SlotId),

    #[error("Unauthorized signer {signer:?} for slot {slot_id} in epoch {epoch}")]
    UnauthorizedSigner {
        slot_id: SlotId,
        signer: Address,
        epoch: u64,
    },

    #[error("Slot {slot_id} exhausted its submissions for epoch {epoch}")]
    EpochExhausted { slot_id: SlotId, epoch: u64 },

    #[error("Epoch {epoch} is closed to submissions from slot {slot_id}")]
    EpochClosed { slot_id: SlotId, epoch: u64 },

    #[error("Slot {0} has a takeover bid pending")]
    TakeoverPending(SlotId),

    #[error("Slot {0} is logging out")]
    LoggingOut(SlotId),

    #[error("Slot {0} already has an open heartbeat challenge")]
    AlreadyChallenged(SlotId),

    #[error("No open heartbeat challenge for slot {0}")]
    UnknownChallenge(SlotId),

    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    #[error("Proof does not match the committed root")]
    ProofMismatch,

    #[error("Epoch length cannot change while slots are occupied")]
    SlotsOccupied,

    #[error("Ledger rejected operation: {0}")]
    Ledger(#[from] LedgerError),
}

impl From<MerkleError> for SlotError {
    fn from(err: MerkleError) -> Self {
        match err {
            MerkleError::ProofMismatch => SlotError::ProofMismatch,
            other => SlotError::InvalidProof(other.to_string()),
        }
    }
}

/// Result type for slot registry operations
pub type SlotResult<T> = Result<T, SlotError>;
