//! # Settlement Runtime
//!
//! Wires the settlement subsystems behind one facade, [`Settlement`], that
//! owns the root ledger and the state of every subsystem.
//!
//! | Subsystem | Crate | Role |
//! |-----------|-------|------|
//! | Merkle codec | `pc-01-merkle-codec` | Batch commitments and inclusion proofs |
//! | Slot registry | `pc-02-slot-registry` | Operator auction, epochs, heartbeats |
//! | Chain graph | `pc-03-chain-graph` | Fork choice, pruning, rewards |
//! | Fraud proofs | `pc-04-fraud-proofs` | Slashing and batch invalidation |
//! | Exit queue | `pc-05-exit-queue` | Exit game and colors |
//!
//! ## Operation flow
//!
//! Every operation validates first, then moves funds on the root ledger in a
//! single all-or-nothing batch, then commits internal state. A rejected
//! operation leaves nothing behind.
//!
//! Economic parameters change only through a [`GovernanceGate`]; color
//! registration is an admin fast path.

pub mod config;
pub mod error;
pub mod governance;
pub mod settlement;

pub use config::{ConfigError, GovernanceConfig, SettlementConfig, ENV_EPOCH_LENGTH, ENV_EXIT_DURATION};
pub use error::{ErrorCategory, SettlementError, SettlementResult};
pub use governance::{GovernanceGate, ParameterChange, Proposal, TimelockGate};
pub use settlement::{BatchReceipt, ColorStatus, Settlement, SettlementStatus, SlotStatus};
