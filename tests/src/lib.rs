//! # Plasma Settlement Test Suite
//!
//! Scenarios that cross subsystem boundaries, driven through the
//! `Settlement` facade against the in-memory ledger.
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs        # Chain harness: operators, signing, deposits
//! └── integration/
//!     ├── fork_choice.rs # Stake-weighted fork choice scenarios
//!     ├── exit_game.rs   # Split deposits, challenges, exit ordering
//!     └── slashing.rs    # Fraud proofs, heartbeats, treasury
//! ```
//!
//! ```bash
//! cargo test -p pc-tests
//! cargo test -p pc-tests integration::exit_game::
//! ```

#[cfg(test)]
pub mod fixtures;
pub mod integration;
