//! # Root Ledger Port
//!
//! The settlement core never holds funds itself. Every balance movement is
//! expressed as a list of [`LedgerOp`]s handed to a [`RootLedger`], which
//! applies the whole list or none of it.
//!
//! ## Custody model
//!
//! - Fungible amounts move between account balances and a per-color bridge
//!   custody pool.
//! - Non-fungible tokens have exactly one [`Holder`]: an account or the
//!   bridge.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::{short_hex, Address, Asset, Color, ColorKind, U256};
use crate::errors::{fmt_address, LedgerError};

/// A single ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerOp {
    /// Move an asset from an account into bridge custody.
    Debit {
        from: Address,
        color: Color,
        asset: Asset,
    },
    /// Release an asset from bridge custody to an account.
    Credit {
        to: Address,
        color: Color,
        asset: Asset,
    },
    /// Move an asset between two accounts.
    Transfer {
        from: Address,
        to: Address,
        color: Color,
        asset: Asset,
    },
    /// Create a fungible amount out of nothing (block rewards).
    Mint { to: Address, color: Color, amount: u128 },
    /// Destroy a fungible amount held in bridge custody.
    Burn { color: Color, amount: u128 },
}

/// Who currently holds a non-fungible token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Holder {
    Account(Address),
    Bridge,
}

/// A deposit as recorded by the root ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub deposit_id: u64,
    pub owner: Address,
    pub color: Color,
    pub asset: Asset,
    /// Root block number at which the deposit was made.
    pub block_number: u64,
}

/// Outbound port to the root-chain ledger and clock.
pub trait RootLedger {
    /// Current root-chain block number.
    fn block_number(&self) -> u64;

    /// Deposit record by id.
    fn deposit_record(&self, deposit_id: u64) -> Option<DepositRecord>;

    /// Move `asset` from `owner` into custody and record a deposit.
    ///
    /// Returns the new deposit id.
    fn record_deposit(
        &mut self,
        owner: Address,
        color: Color,
        asset: Asset,
    ) -> Result<u64, LedgerError>;

    /// Whether the bridge currently holds the given token.
    fn is_custodied(&self, color: Color, token_id: U256) -> bool;

    /// Apply all operations or none.
    fn apply(&mut self, ops: &[LedgerOp]) -> Result<(), LedgerError>;

    fn debit(&mut self, from: Address, color: Color, asset: Asset) -> Result<(), LedgerError> {
        self.apply(&[LedgerOp::Debit { from, color, asset }])
    }

    fn credit(&mut self, to: Address, color: Color, asset: Asset) -> Result<(), LedgerError> {
        self.apply(&[LedgerOp::Credit { to, color, asset }])
    }

    fn transfer(
        &mut self,
        from: Address,
        to: Address,
        color: Color,
        asset: Asset,
    ) -> Result<(), LedgerError> {
        self.apply(&[LedgerOp::Transfer {
            from,
            to,
            color,
            asset,
        }])
    }

    fn mint(&mut self, to: Address, color: Color, amount: u128) -> Result<(), LedgerError> {
        self.apply(&[LedgerOp::Mint { to, color, amount }])
    }

    /// Take custody of a non-fungible token unless the bridge already holds it.
    fn custody(&mut self, owner: Address, color: Color, asset: Asset) -> Result<(), LedgerError> {
        match asset.token_id() {
            Some(id) if self.is_custodied(color, id) => Ok(()),
            _ => self.debit(owner, color, asset),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    balances: HashMap<(Address, Color), u128>,
    custody: HashMap<Color, u128>,
    tokens: HashMap<(Color, U256), Holder>,
    minted: HashMap<Color, u128>,
}

impl LedgerState {
    fn balance(&self, account: &Address, color: Color) -> u128 {
        self.balances.get(&(*account, color)).copied().unwrap_or(0)
    }

    fn sub_balance(&mut self, account: Address, color: Color, amount: u128) -> Result<(), LedgerError> {
        let available = self.balance(&account, color);
        let remaining = available
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::InsufficientBalance {
                account: fmt_address(&account),
                color,
                available,
                required: amount,
            })?;
        self.balances.insert((account, color), remaining);
        Ok(())
    }

    fn add_balance(&mut self, account: Address, color: Color, amount: u128) -> Result<(), LedgerError> {
        let entry = self.balances.entry((account, color)).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { color })?;
        Ok(())
    }

    fn sub_custody(&mut self, color: Color, amount: u128) -> Result<(), LedgerError> {
        let available = self.custody.get(&color).copied().unwrap_or(0);
        let remaining = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientCustody {
                color,
                available,
                required: amount,
            })?;
        self.custody.insert(color, remaining);
        Ok(())
    }

    fn add_custody(&mut self, color: Color, amount: u128) -> Result<(), LedgerError> {
        let entry = self.custody.entry(color).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { color })?;
        Ok(())
    }

    fn move_token(
        &mut self,
        color: Color,
        id: U256,
        from: Holder,
        to: Holder,
    ) -> Result<(), LedgerError> {
        match self.tokens.get(&(color, id)) {
            Some(holder) if *holder == from => {
                self.tokens.insert((color, id), to);
                Ok(())
            }
            _ => Err(LedgerError::NotTokenOwner {
                color,
                token_id: id,
                expected: match from {
                    Holder::Account(address) => fmt_address(&address),
                    Holder::Bridge => "bridge".to_string(),
                },
            }),
        }
    }

    fn apply_op(&mut self, op: &LedgerOp) -> Result<(), LedgerError> {
        match *op {
            LedgerOp::Debit { from, color, asset } => match asset {
                Asset::Fungible(amount) => {
                    self.sub_balance(from, color, amount)?;
                    self.add_custody(color, amount)
                }
                _ => self.move_token(color, token_id(&asset), Holder::Account(from), Holder::Bridge),
            },
            LedgerOp::Credit { to, color, asset } => match asset {
                Asset::Fungible(amount) => {
                    self.sub_custody(color, amount)?;
                    self.add_balance(to, color, amount)
                }
                _ => self.move_token(color, token_id(&asset), Holder::Bridge, Holder::Account(to)),
            },
            LedgerOp::Transfer {
                from,
                to,
                color,
                asset,
            } => match asset {
                Asset::Fungible(amount) => {
                    self.sub_balance(from, color, amount)?;
                    self.add_balance(to, color, amount)
                }
                _ => self.move_token(
                    color,
                    token_id(&asset),
                    Holder::Account(from),
                    Holder::Account(to),
                ),
            },
            LedgerOp::Mint { to, color, amount } => {
                if color.kind() != ColorKind::Fungible {
                    return Err(LedgerError::KindMismatch { kind: color.kind() });
                }
                self.add_balance(to, color, amount)?;
                let minted = self.minted.entry(color).or_insert(0);
                *minted = minted.saturating_add(amount);
                Ok(())
            }
            LedgerOp::Burn { color, amount } => {
                if color.kind() != ColorKind::Fungible {
                    return Err(LedgerError::KindMismatch { kind: color.kind() });
                }
                self.sub_custody(color, amount)
            }
        }
    }
}

fn token_id(asset: &Asset) -> U256 {
    asset.token_id().unwrap_or_default()
}

/// In-memory root ledger used by tests and the demo binary.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: LedgerState,
    deposits: BTreeMap<u64, DepositRecord>,
    next_deposit_id: u64,
    block_number: u64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            next_deposit_id: 1,
            ..Self::default()
        }
    }

    /// Credit an account out of thin air (test setup).
    pub fn fund(&mut self, account: Address, color: Color, amount: u128) {
        let entry = self.state.balances.entry((account, color)).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Hand a fresh non-fungible token to an account (test setup).
    pub fn mint_token(&mut self, account: Address, color: Color, id: U256) {
        self.state.tokens.insert((color, id), Holder::Account(account));
    }

    /// Advance the root-chain clock.
    pub fn advance_blocks(&mut self, blocks: u64) {
        self.block_number = self.block_number.saturating_add(blocks);
    }

    pub fn set_block_number(&mut self, block_number: u64) {
        self.block_number = block_number;
    }

    pub fn balance(&self, account: &Address, color: Color) -> u128 {
        self.state.balance(account, color)
    }

    pub fn custody_balance(&self, color: Color) -> u128 {
        self.state.custody.get(&color).copied().unwrap_or(0)
    }

    pub fn holder_of(&self, color: Color, id: U256) -> Option<Holder> {
        self.state.tokens.get(&(color, id)).copied()
    }

    /// Total amount minted for `color` so far.
    pub fn minted(&self, color: Color) -> u128 {
        self.state.minted.get(&color).copied().unwrap_or(0)
    }
}

impl RootLedger for InMemoryLedger {
    fn block_number(&self) -> u64 {
        self.block_number
    }

    fn deposit_record(&self, deposit_id: u64) -> Option<DepositRecord> {
        self.deposits.get(&deposit_id).copied()
    }

    fn record_deposit(
        &mut self,
        owner: Address,
        color: Color,
        asset: Asset,
    ) -> Result<u64, LedgerError> {
        self.apply(&[LedgerOp::Debit {
            from: owner,
            color,
            asset,
        }])?;
        let deposit_id = self.next_deposit_id.max(1);
        self.next_deposit_id = deposit_id + 1;
        self.deposits.insert(
            deposit_id,
            DepositRecord {
                deposit_id,
                owner,
                color,
                asset,
                block_number: self.block_number,
            },
        );
        debug!(
            "[ledger] deposit #{} recorded for 0x{} on {}",
            deposit_id,
            short_hex(&owner),
            color
        );
        Ok(deposit_id)
    }

    fn is_custodied(&self, color: Color, token_id: U256) -> bool {
        matches!(self.state.tokens.get(&(color, token_id)), Some(Holder::Bridge))
    }

    fn apply(&mut self, ops: &[LedgerOp]) -> Result<(), LedgerError> {
        let mut scratch = self.state.clone();
        for op in ops {
            scratch.apply_op(op)?;
        }
        self.state = scratch;
        Ok(())
    }
}
