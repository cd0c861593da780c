//! # Error Types
//!
//! Errors shared by every settlement subsystem.

use thiserror::Error;

use crate::entities::{Address, Color, ColorKind, U256};

/// Asset/color consistency errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    /// The asset's kind does not match the kind implied by its color.
    #[error("{color} holds {expected:?} assets, got {actual:?}")]
    KindMismatch {
        color: Color,
        expected: ColorKind,
        actual: ColorKind,
    },
}

/// Errors returned by a [`crate::RootLedger`] when it rejects a batch.
///
/// A rejected batch leaves the ledger exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Account balance too small for a debit.
    #[error("insufficient balance: {account} has {available} of {color}, needs {required}")]
    InsufficientBalance {
        account: String,
        color: Color,
        available: u128,
        required: u128,
    },

    /// Bridge custody too small for a release.
    #[error("insufficient custody for {color}: has {available}, needs {required}")]
    InsufficientCustody {
        color: Color,
        available: u128,
        required: u128,
    },

    /// Non-fungible token is not held by the expected party.
    #[error("token {token_id} of {color} is not held by {expected}")]
    NotTokenOwner {
        color: Color,
        token_id: U256,
        expected: String,
    },

    /// Operation applied to an asset of the wrong kind.
    #[error("operation does not apply to {kind:?} assets")]
    KindMismatch { kind: ColorKind },

    /// Balance arithmetic overflowed.
    #[error("balance overflow for {color}")]
    Overflow { color: Color },
}

/// Render an address for error messages.
pub fn fmt_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address))
}
