//! # Fraud Proofs (pc-04)
//!
//! Anyone can prove that an operator misbehaved. Reports are checked
//! against the committed batch roots of the chain graph (pc-03) and, once
//! accepted, slash the responsible slot in the registry (pc-02).
//!
//! | Report | Guilty party | Batch suffix invalidated |
//! |--------|--------------|--------------------------|
//! | Double spend | Slot of the later spend | Yes |
//! | Invalid deposit | Slot of the including batch | Yes |
//! | Height conflict | Slot that signed both headers | No |
//!
//! The reporter is paid `reporter_reward_percent` of the slashed stake;
//! the remainder stays in bridge custody. A rejected report changes
//! nothing.

pub mod config;
pub mod domain;

pub use config::FraudConfig;
pub use domain::{
    FraudContext, FraudError, FraudKind, FraudOutcome, FraudProofEngine, FraudResult, SignedHeader,
};
