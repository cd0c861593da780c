//! # Shared Crypto
//!
//! Cryptographic primitives used by the settlement subsystems.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | Keccak-256 | Transaction ids, Merkle nodes, batch hashes |
//! | `ecdsa` | secp256k1 (recoverable) | Batch, spend, sale and heartbeat signatures |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic nonces, low-S only (EIP-2)
//! - **Signer recovery**: addresses are derived Ethereum-style from the
//!   recovered public key, so no public keys are stored anywhere

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod hashing;

// Re-exports
pub use ecdsa::{address_from_pubkey, recover_signer, Secp256k1KeyPair};
pub use errors::CryptoError;
pub use hashing::{hash_pair, keccak256, keccak256_concat};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
