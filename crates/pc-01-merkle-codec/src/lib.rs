//! # Hashed Merkle Codec (pc-01)
//!
//! Binds child-chain transactions to the single hash an operator commits
//! to the root ledger for each batch.
//!
//! ## Commitment Layout
//!
//! ```text
//!                 merkle_root = H(tx_root || validator_root)
//!                    /                              \
//!   tx_root (fixed-depth tree,           validator_root (sparse tree,
//!   leaf i = keccak(tx_i))               leaf slot_id = keccak(heartbeat))
//! ```
//!
//! A batch hash is `keccak(parent || height || merkle_root || signature)`;
//! the operator signs `keccak(parent || height || merkle_root)`.
//!
//! ## Compact Proofs
//!
//! Every tree has a fixed depth. Empty positions hold the default subtree
//! hash of their level, and a proof records with one bit per level whether
//! the sibling was a default placeholder. Default siblings are omitted, so
//! proofs for sparsely filled trees stay short.
//!
//! | Check | Failure |
//! |-------|---------|
//! | bit-trail length, sibling count, index capacity | `InvalidProof` |
//! | recomputed root differs | `ProofMismatch` |

pub mod config;
pub mod domain;

pub use config::MerkleConfig;
pub use domain::{
    batch_hash, batch_signing_hash, compute_root, default_hashes, merkle_root, verify,
    BatchBuilder, BuiltBatch, InclusionProof, MerkleError, MerkleProof, MerkleResult, MerkleTree,
    SparseMerkleTree, ValidatorLeafProof, MAX_TREE_DEPTH,
};
