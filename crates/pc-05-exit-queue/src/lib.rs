//! # Exit Queue (pc-05)
//!
//! Holders of child-chain outputs withdraw them to the root ledger by
//! starting an exit with an inclusion proof against a canonical batch.
//!
//! ## Lifecycle
//!
//! ```text
//! start_exit ──► Pending ──(exit_duration, head of queue)──► Finalized
//!                   │
//!                   └──(spend proof)──► Challenged
//! ```
//!
//! Every exit posts a bond in `bond_color`. Finalization returns it to the
//! payer; a successful challenge hands it to the challenger or keeps it in
//! custody, per [`BondPolicy`].
//!
//! An exit's payout can be tokenized into a transferable receipt; the
//! payout is then parked at finalization until the holder redeems it.
//!
//! Colors must be registered before their outputs can exit; the color
//! registry also enforces that an asset's kind matches its color range.

pub mod config;
pub mod domain;

pub use config::{BondPolicy, ExitQueueConfig};
pub use domain::{
    ColorRegistry, Exit, ExitError, ExitPriority, ExitQueue, ExitReceipt, ExitResult, ExitSale,
    ExitState, FinalizedExit,
};
