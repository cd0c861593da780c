//! Batch commitment and transaction inclusion proofs.

use serde::{Deserialize, Serialize};
use shared_crypto::{hash_pair, keccak256_concat};
use shared_types::{Hash, Signature, SlotId, Transaction};
use tracing::debug;

use super::error::{MerkleError, MerkleResult};
use super::sparse::SparseMerkleTree;
use super::tree::{compute_root, MerkleProof, MerkleTree};
use crate::config::MerkleConfig;

/// Committed batch root: `H(tx_root || validator_root)`.
pub fn merkle_root(tx_root: &Hash, validator_root: &Hash) -> Hash {
    hash_pair(tx_root, validator_root)
}

/// Hash the operator signs: `keccak(parent || height || merkle_root)`.
pub fn batch_signing_hash(parent_hash: &Hash, height: u64, merkle_root: &Hash) -> Hash {
    keccak256_concat(&[parent_hash, &height.to_be_bytes(), merkle_root])
}

/// Batch identity: `keccak(parent || height || merkle_root || signature)`.
pub fn batch_hash(parent_hash: &Hash, height: u64, merkle_root: &Hash, signature: &Signature) -> Hash {
    keccak256_concat(&[parent_hash, &height.to_be_bytes(), merkle_root, signature])
}

/// Proof that a transaction is included in a committed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Batch the transaction is claimed to be in.
    pub batch_hash: Hash,
    /// The full transaction.
    pub tx: Transaction,
    /// Position in the batch's transaction tree.
    pub tx_index: u64,
    /// Path from `keccak(tx)` to the transaction root.
    pub tx_proof: MerkleProof,
    /// Other half of the batch commitment.
    pub validator_root: Hash,
}

impl InclusionProof {
    pub fn tx_hash(&self) -> Hash {
        self.tx.hash()
    }

    /// Check the proof against the batch's committed `merkle_root`.
    pub fn verify(&self, committed_root: &Hash, depth: u32) -> MerkleResult<()> {
        if self.tx_proof.index != self.tx_index {
            return Err(MerkleError::malformed(format!(
                "path is for index {}, claimed {}",
                self.tx_proof.index, self.tx_index
            )));
        }
        let tx_root = compute_root(&self.tx_proof, &self.tx.hash(), depth)?;
        if merkle_root(&tx_root, &self.validator_root) != *committed_root {
            return Err(MerkleError::ProofMismatch);
        }
        Ok(())
    }
}

/// Proof of a validator-tree leaf (a heartbeat hash, or zero for absence).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorLeafProof {
    pub batch_hash: Hash,
    /// Other half of the batch commitment.
    pub tx_root: Hash,
    pub slot_id: SlotId,
    /// Leaf value; zero proves the slot has no heartbeat in this batch.
    pub leaf: Hash,
    pub proof: MerkleProof,
}

impl ValidatorLeafProof {
    /// Check the proof against the batch's committed `merkle_root`.
    pub fn verify(&self, committed_root: &Hash, depth: u32) -> MerkleResult<()> {
        if self.proof.index != u64::from(self.slot_id) {
            return Err(MerkleError::malformed("validator path does not match slot"));
        }
        let validator_root = compute_root(&self.proof, &self.leaf, depth)?;
        if merkle_root(&self.tx_root, &validator_root) != *committed_root {
            return Err(MerkleError::ProofMismatch);
        }
        Ok(())
    }
}

/// Assembles a batch from transactions; heartbeats also fill the validator tree.
#[derive(Debug, Clone)]
pub struct BatchBuilder {
    depth: u32,
    capacity: u64,
    transactions: Vec<Transaction>,
    validators: SparseMerkleTree,
}

impl BatchBuilder {
    pub fn new(config: &MerkleConfig) -> MerkleResult<Self> {
        config.validate()?;
        Ok(Self {
            depth: config.tree_depth,
            capacity: config.capacity(),
            transactions: Vec::new(),
            validators: SparseMerkleTree::new(config.tree_depth)?,
        })
    }

    /// Append a transaction, returning its index in the batch.
    pub fn push(&mut self, tx: Transaction) -> MerkleResult<u64> {
        let index = self.transactions.len() as u64;
        if index >= self.capacity {
            return Err(MerkleError::BatchFull {
                capacity: self.capacity,
            });
        }
        if let Transaction::Heartbeat { slot_id, .. } = &tx {
            self.validators.insert(u64::from(*slot_id), tx.hash())?;
        }
        self.transactions.push(tx);
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn build(self) -> MerkleResult<BuiltBatch> {
        let leaves = self.transactions.iter().map(Transaction::hash).collect();
        let tree = MerkleTree::build(self.depth, leaves)?;
        let built = BuiltBatch {
            tree,
            validators: self.validators,
            transactions: self.transactions,
        };
        debug!(
            "[pc-01] built batch of {} txs, root {}",
            built.transactions.len(),
            shared_types::short_hex(&built.merkle_root())
        );
        Ok(built)
    }
}

/// Output of [`BatchBuilder::build`].
#[derive(Debug, Clone)]
pub struct BuiltBatch {
    tree: MerkleTree,
    validators: SparseMerkleTree,
    transactions: Vec<Transaction>,
}

impl BuiltBatch {
    pub fn tx_root(&self) -> Hash {
        self.tree.root()
    }

    pub fn validator_root(&self) -> Hash {
        self.validators.root()
    }

    pub fn merkle_root(&self) -> Hash {
        merkle_root(&self.tx_root(), &self.validator_root())
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Hash the operator must sign to submit this batch on `parent_hash`.
    pub fn signing_hash(&self, parent_hash: &Hash, height: u64) -> Hash {
        batch_signing_hash(parent_hash, height, &self.merkle_root())
    }

    /// Inclusion proof for the transaction at `tx_index`.
    pub fn inclusion_proof(&self, batch_hash: Hash, tx_index: u64) -> MerkleResult<InclusionProof> {
        let tx = usize::try_from(tx_index)
            .ok()
            .and_then(|i| self.transactions.get(i))
            .cloned()
            .ok_or(MerkleError::UnknownLeaf(tx_index))?;
        Ok(InclusionProof {
            batch_hash,
            tx,
            tx_index,
            tx_proof: self.tree.proof(tx_index)?,
            validator_root: self.validator_root(),
        })
    }

    /// Validator-tree proof for `slot_id` (presence or absence).
    pub fn validator_proof(&self, batch_hash: Hash, slot_id: SlotId) -> MerkleResult<ValidatorLeafProof> {
        let key = u64::from(slot_id);
        Ok(ValidatorLeafProof {
            batch_hash,
            tx_root: self.tx_root(),
            slot_id,
            leaf: self.validators.get(key),
            proof: self.validators.prove(key)?,
        })
    }
}
