//! # Shared Types Crate
//!
//! This crate contains the entities exchanged between the settlement
//! subsystems and the port through which they reach the root ledger.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Disjoint Color Ranges**: Fungible, non-fungible and stateful
//!   non-fungible colors never overlap, so an asset kind is decided by its
//!   color alone.
//! - **Injected Ledger**: Balances and custody live behind [`RootLedger`];
//!   the core never touches ambient global state.

pub mod entities;
pub mod errors;
pub mod ledger;

pub use entities::*;
pub use errors::*;
pub use ledger::{DepositRecord, Holder, InMemoryLedger, LedgerOp, RootLedger};
