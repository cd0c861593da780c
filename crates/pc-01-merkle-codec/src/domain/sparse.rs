//! Key-addressed sparse Merkle tree.
//!
//! Used for per-slot validator metadata: the leaf at key `slot_id` holds the
//! hash of that slot's heartbeat in a batch, absent slots hold zero.

use std::collections::HashMap;

use shared_crypto::hash_pair;
use shared_types::{Hash, ZERO_HASH};

use super::error::{MerkleError, MerkleResult};
use super::tree::{default_hashes, verify, MerkleProof, MAX_TREE_DEPTH};

/// Sparse Merkle tree storing only non-default nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseMerkleTree {
    depth: u32,
    /// `nodes[level]` maps position to hash for non-default nodes.
    nodes: Vec<HashMap<u64, Hash>>,
    defaults: Vec<Hash>,
}

impl SparseMerkleTree {
    pub fn new(depth: u32) -> MerkleResult<Self> {
        if depth == 0 || depth > MAX_TREE_DEPTH {
            return Err(MerkleError::InvalidDepth(depth));
        }
        Ok(Self {
            depth,
            nodes: vec![HashMap::new(); depth as usize + 1],
            defaults: default_hashes(depth),
        })
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn root(&self) -> Hash {
        self.node(self.depth as usize, 0)
    }

    /// Leaf value at `key` (zero when absent).
    pub fn get(&self, key: u64) -> Hash {
        self.node(0, key)
    }

    /// Set the leaf at `key`; a zero value removes it.
    pub fn insert(&mut self, key: u64, value: Hash) -> MerkleResult<()> {
        self.check_key(key)?;
        self.store(0, key, value);

        let mut position = key;
        for level in 0..self.depth as usize {
            let left = self.node(level, position & !1);
            let right = self.node(level, position | 1);
            position >>= 1;
            self.store(level + 1, position, hash_pair(&left, &right));
        }
        Ok(())
    }

    /// Proof for the leaf at `key`, present or not.
    pub fn prove(&self, key: u64) -> MerkleResult<MerkleProof> {
        self.check_key(key)?;
        Ok(MerkleProof::assemble(
            self.depth,
            key,
            &self.defaults,
            |level, position| self.node(level, position),
        ))
    }

    /// Verify that `key` maps to `value` under `root`.
    pub fn verify_inclusion(
        root: &Hash,
        key: u64,
        value: &Hash,
        proof: &MerkleProof,
        depth: u32,
    ) -> MerkleResult<()> {
        if proof.index != key {
            return Err(MerkleError::malformed(format!(
                "proof is for key {}, not {}",
                proof.index, key
            )));
        }
        verify(root, proof, value, depth)
    }

    /// Verify that `key` is empty under `root`.
    pub fn verify_absent(root: &Hash, key: u64, proof: &MerkleProof, depth: u32) -> MerkleResult<()> {
        Self::verify_inclusion(root, key, &ZERO_HASH, proof, depth)
    }

    fn check_key(&self, key: u64) -> MerkleResult<()> {
        if self.depth < 64 && key >> self.depth != 0 {
            return Err(MerkleError::IndexOutOfRange {
                index: key,
                capacity: 1u64 << self.depth,
            });
        }
        Ok(())
    }

    fn node(&self, level: usize, position: u64) -> Hash {
        self.nodes[level]
            .get(&position)
            .copied()
            .unwrap_or(self.defaults[level])
    }

    fn store(&mut self, level: usize, position: u64, hash: Hash) {
        if hash == self.defaults[level] {
            self.nodes[level].remove(&position);
        } else {
            self.nodes[level].insert(position, hash);
        }
    }
}
