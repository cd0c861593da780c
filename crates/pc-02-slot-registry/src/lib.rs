//! # Slot Registry (pc-02)
//!
//! Operator slots, the stake auction over them, and the rules deciding who
//! may submit a batch at a given height.
//!
//! ## Epochs
//!
//! A batch at height `h` belongs to epoch `(h - 1) / epoch_length`. The
//! registry tracks `completed_epochs = tip_height / epoch_length` of the
//! canonical tip and never lets it decrease.
//!
//! ## Slot Lifecycle
//!
//! ```text
//!  vacant ──bid (before first batch)──→ occupied
//!  vacant/occupied ──bid (outbids effective stake)──→ pending
//!  pending ──activate (activation epoch reached)──→ occupied by bidder
//!  occupied ──request_logout──→ leaving ──activate──→ vacant
//! ```
//!
//! ## Invariants
//!
//! - The signer authorized for epoch E is fixed once E begins: activations
//!   bind from the next epoch and the previous signer finishes the current one.
//! - Zero-stake slots are inert.
//! - Slashing never removes more than the stake backing the offending
//!   signer. A replaced owner's stake stays held until its signer stops
//!   binding.
//! - Every balance movement is one all-or-nothing ledger batch, applied
//!   before the registry mutates.

pub mod config;
pub mod domain;

pub use config::SlotRegistryConfig;
pub use domain::{
    completed_epochs, epoch_of, BatchCommitment, BidOutcome, HeartbeatChallenge, PendingBid,
    RetiringStake, Slot, SlotError, SlotRegistry, SlotResult,
};
