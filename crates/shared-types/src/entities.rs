//! # Core Domain Entities
//!
//! Defines the child-chain entities every settlement subsystem agrees on.
//!
//! ## Clusters
//!
//! - **Primitives**: `Hash`, `Address`, `Signature`, `SlotId`
//! - **Assets**: `Color`, `ColorKind`, `Asset`, `Output`
//! - **Transactions**: `Outpoint`, `Input`, `Transaction`

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha3::{Digest, Keccak256};

use crate::errors::AssetError;

// Re-export U256 from primitive-types for use across all subsystems
pub use primitive_types::U256;

// =============================================================================
// CLUSTER A: PRIMITIVES
// =============================================================================

/// A 32-byte Keccak-256 hash.
pub type Hash = [u8; 32];

/// A 20-byte Ethereum-style address.
pub type Address = [u8; 20];

/// A 65-byte recoverable secp256k1 signature (r || s || v).
pub type Signature = [u8; 65];

/// Operator slot index in `[0, epoch_length)`.
pub type SlotId = u32;

/// The all-zero hash (empty leaf, genesis parent).
pub const ZERO_HASH: Hash = [0u8; 32];

/// The all-zero address.
pub const ZERO_ADDRESS: Address = [0u8; 20];

/// Keccak-256 over a single byte string.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Keccak-256 over the concatenation of several byte strings.
pub fn keccak256_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

// =============================================================================
// CLUSTER B: ASSETS
// =============================================================================

/// First color of the non-fungible range.
pub const NFT_FIRST_COLOR: u16 = 32_768;

/// First color of the stateful non-fungible range.
pub const NST_FIRST_COLOR: u16 = 49_152;

/// Asset class identifier.
///
/// The numeric range decides the kind:
///
/// | Range | Kind |
/// |-------|------|
/// | `[0, 32768)` | fungible |
/// | `[32768, 49152)` | non-fungible |
/// | `[49152, 65536)` | non-fungible with state |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Color(pub u16);

impl Color {
    /// Kind implied by the color's numeric range.
    pub fn kind(self) -> ColorKind {
        if self.0 >= NST_FIRST_COLOR {
            ColorKind::NonFungibleWithState
        } else if self.0 >= NFT_FIRST_COLOR {
            ColorKind::NonFungible
        } else {
            ColorKind::Fungible
        }
    }

    /// The `index`-th color of `kind`, if it fits in that kind's range.
    pub fn nth(kind: ColorKind, index: u16) -> Option<Self> {
        let (first, end) = kind.range();
        let color = u32::from(first) + u32::from(index);
        if color < end {
            Some(Color(color as u16))
        } else {
            None
        }
    }

    /// Big-endian encoding.
    pub fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "color#{}", self.0)
    }
}

/// Asset kind, one per color range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorKind {
    Fungible,
    NonFungible,
    NonFungibleWithState,
}

impl ColorKind {
    /// Half-open `[first, end)` color range for this kind.
    pub fn range(self) -> (u16, u32) {
        match self {
            ColorKind::Fungible => (0, u32::from(NFT_FIRST_COLOR)),
            ColorKind::NonFungible => (NFT_FIRST_COLOR, u32::from(NST_FIRST_COLOR)),
            ColorKind::NonFungibleWithState => (NST_FIRST_COLOR, u32::from(u16::MAX) + 1),
        }
    }

    fn tag(self) -> u8 {
        match self {
            ColorKind::Fungible => 0,
            ColorKind::NonFungible => 1,
            ColorKind::NonFungibleWithState => 2,
        }
    }
}

/// A quantity of some asset class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    /// Divisible amount of a fungible token.
    Fungible(u128),
    /// A single non-fungible token.
    NonFungible(U256),
    /// A non-fungible token carrying a mutable state root.
    NonFungibleWithState { id: U256, state_root: Hash },
}

impl Asset {
    /// Kind of this asset.
    pub fn kind(&self) -> ColorKind {
        match self {
            Asset::Fungible(_) => ColorKind::Fungible,
            Asset::NonFungible(_) => ColorKind::NonFungible,
            Asset::NonFungibleWithState { .. } => ColorKind::NonFungibleWithState,
        }
    }

    /// Fungible amount, if fungible.
    pub fn amount(&self) -> Option<u128> {
        match self {
            Asset::Fungible(amount) => Some(*amount),
            _ => None,
        }
    }

    /// Token id, if non-fungible.
    pub fn token_id(&self) -> Option<U256> {
        match self {
            Asset::Fungible(_) => None,
            Asset::NonFungible(id) => Some(*id),
            Asset::NonFungibleWithState { id, .. } => Some(*id),
        }
    }

    /// Check that this asset may live under `color`.
    pub fn check_color(&self, color: Color) -> Result<(), AssetError> {
        if color.kind() != self.kind() {
            return Err(AssetError::KindMismatch {
                color,
                expected: color.kind(),
                actual: self.kind(),
            });
        }
        Ok(())
    }

    fn write_canonical(&self, buf: &mut Vec<u8>) {
        buf.push(self.kind().tag());
        let mut word = [0u8; 32];
        match self {
            Asset::Fungible(amount) => {
                U256::from(*amount).to_big_endian(&mut word);
                buf.extend_from_slice(&word);
            }
            Asset::NonFungible(id) => {
                id.to_big_endian(&mut word);
                buf.extend_from_slice(&word);
            }
            Asset::NonFungibleWithState { id, state_root } => {
                id.to_big_endian(&mut word);
                buf.extend_from_slice(&word);
                buf.extend_from_slice(state_root);
            }
        }
    }
}

/// A transaction output: an asset assigned to an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Output {
    /// Address allowed to spend or exit this output.
    pub owner: Address,
    /// Asset class.
    pub color: Color,
    /// Held asset; its kind must match `color.kind()`.
    pub asset: Asset,
}

impl Output {
    /// Create a fungible output.
    pub fn fungible(owner: Address, color: Color, amount: u128) -> Self {
        Self {
            owner,
            color,
            asset: Asset::Fungible(amount),
        }
    }

    /// Create a non-fungible output.
    pub fn non_fungible(owner: Address, color: Color, id: U256) -> Self {
        Self {
            owner,
            color,
            asset: Asset::NonFungible(id),
        }
    }

    /// Check color/asset consistency.
    pub fn validate(&self) -> Result<(), AssetError> {
        self.asset.check_color(self.color)
    }

    fn write_canonical(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.owner);
        buf.extend_from_slice(&self.color.to_be_bytes());
        self.asset.write_canonical(buf);
    }
}

// =============================================================================
// CLUSTER C: TRANSACTIONS
// =============================================================================

/// Reference to an output of a previous transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outpoint {
    /// Hash of the transaction that created the output.
    pub tx_hash: Hash,
    /// Output position in that transaction.
    pub index: u8,
}

impl Outpoint {
    pub fn new(tx_hash: Hash, index: u8) -> Self {
        Self { tx_hash, index }
    }

    /// `keccak(tx_hash || index)`, the identity of an exit.
    pub fn utxo_id(&self) -> Hash {
        keccak256_concat(&[&self.tx_hash, &[self.index]])
    }
}

/// A spent outpoint plus the owner's signature over the spending sighash.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub outpoint: Outpoint,
    #[serde_as(as = "Bytes")]
    pub signature: Signature,
}

impl Input {
    /// Input with an empty signature, to be filled after computing the sighash.
    pub fn unsigned(outpoint: Outpoint) -> Self {
        Self {
            outpoint,
            signature: [0u8; 65],
        }
    }
}

/// A child-chain transaction.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    /// Mints a child-chain output backed by a root-ledger deposit record.
    Deposit { deposit_id: u64, output: Output },
    /// Spends outputs and creates new ones.
    Transfer {
        inputs: Vec<Input>,
        outputs: Vec<Output>,
    },
    /// Operator liveness record for a slot.
    Heartbeat {
        slot_id: SlotId,
        nonce: u64,
        #[serde_as(as = "Bytes")]
        signature: Signature,
    },
}

const TAG_DEPOSIT: u8 = 0x01;
const TAG_TRANSFER: u8 = 0x02;
const TAG_HEARTBEAT: u8 = 0x03;

impl Transaction {
    /// Canonical encoding including signatures (the Merkle leaf preimage).
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        self.write_canonical(&mut buf, true);
        buf
    }

    /// Transaction hash: `keccak(canonical_bytes)`.
    pub fn hash(&self) -> Hash {
        keccak256(&self.canonical_bytes())
    }

    /// Hash that signers commit to (signatures stripped).
    pub fn sighash(&self) -> Hash {
        let mut buf = Vec::with_capacity(128);
        self.write_canonical(&mut buf, false);
        keccak256(&buf)
    }

    /// Outputs created by this transaction.
    pub fn outputs(&self) -> &[Output] {
        match self {
            Transaction::Deposit { output, .. } => std::slice::from_ref(output),
            Transaction::Transfer { outputs, .. } => outputs,
            Transaction::Heartbeat { .. } => &[],
        }
    }

    /// Inputs consumed by this transaction.
    pub fn inputs(&self) -> &[Input] {
        match self {
            Transaction::Transfer { inputs, .. } => inputs,
            _ => &[],
        }
    }

    /// Output at `index`, if any.
    pub fn output(&self, index: u8) -> Option<&Output> {
        self.outputs().get(usize::from(index))
    }

    /// Input at `index`, if any.
    pub fn input(&self, index: u8) -> Option<&Input> {
        self.inputs().get(usize::from(index))
    }

    /// Whether this is a deposit transaction.
    pub fn is_deposit(&self) -> bool {
        matches!(self, Transaction::Deposit { .. })
    }

    fn write_canonical(&self, buf: &mut Vec<u8>, with_signatures: bool) {
        match self {
            Transaction::Deposit { deposit_id, output } => {
                buf.push(TAG_DEPOSIT);
                buf.extend_from_slice(&deposit_id.to_be_bytes());
                output.write_canonical(buf);
            }
            Transaction::Transfer { inputs, outputs } => {
                buf.push(TAG_TRANSFER);
                buf.extend_from_slice(&(inputs.len() as u32).to_be_bytes());
                for input in inputs {
                    buf.extend_from_slice(&input.outpoint.tx_hash);
                    buf.push(input.outpoint.index);
                    if with_signatures {
                        buf.extend_from_slice(&input.signature);
                    }
                }
                buf.extend_from_slice(&(outputs.len() as u32).to_be_bytes());
                for output in outputs {
                    output.write_canonical(buf);
                }
            }
            Transaction::Heartbeat {
                slot_id,
                nonce,
                signature,
            } => {
                buf.push(TAG_HEARTBEAT);
                buf.extend_from_slice(&slot_id.to_be_bytes());
                buf.extend_from_slice(&nonce.to_be_bytes());
                if with_signatures {
                    buf.extend_from_slice(signature);
                }
            }
        }
    }
}

/// Short hex prefix for log lines.
pub fn short_hex(bytes: &[u8]) -> String {
    hex::encode(&bytes[..bytes.len().min(4)])
}
