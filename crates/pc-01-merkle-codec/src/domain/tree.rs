//! Fixed-depth binary Merkle tree with default-sibling compression.

use serde::{Deserialize, Serialize};
use shared_crypto::hash_pair;
use shared_types::{Hash, ZERO_HASH};

use super::error::{MerkleError, MerkleResult};

/// Deepest tree the codec addresses (indices are `u64`).
pub const MAX_TREE_DEPTH: u32 = 64;

/// Default subtree hashes for levels `0..=depth`.
///
/// `default[0]` is the zero leaf and `default[l + 1] = H(default[l] || default[l])`.
pub fn default_hashes(depth: u32) -> Vec<Hash> {
    let mut defaults = Vec::with_capacity(depth as usize + 1);
    defaults.push(ZERO_HASH);
    for level in 0..depth as usize {
        let below = defaults[level];
        defaults.push(hash_pair(&below, &below));
    }
    defaults
}

fn check_depth(depth: u32) -> MerkleResult<()> {
    if depth == 0 || depth > MAX_TREE_DEPTH {
        return Err(MerkleError::InvalidDepth(depth));
    }
    Ok(())
}

fn in_capacity(depth: u32, index: u64) -> bool {
    depth >= 64 || index >> depth == 0
}

/// Compact inclusion proof.
///
/// Bit `l` of `default_bits` (byte `l / 8`, bit `l % 8`) is set when the
/// sibling at level `l` is the default subtree hash; such siblings are not
/// listed in `siblings`. Bit `l` of `index` tells whether the running node
/// is the right child at level `l`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Leaf position.
    pub index: u64,
    /// `ceil(depth / 8)` bytes of default-sibling flags.
    pub default_bits: Vec<u8>,
    /// Non-default siblings, leaf level first.
    pub siblings: Vec<Hash>,
}

impl MerkleProof {
    pub(crate) fn assemble(
        depth: u32,
        index: u64,
        defaults: &[Hash],
        mut sibling_at: impl FnMut(usize, u64) -> Hash,
    ) -> Self {
        let mut default_bits = vec![0u8; (depth as usize).div_ceil(8)];
        let mut siblings = Vec::new();
        let mut position = index;

        for level in 0..depth as usize {
            let sibling = sibling_at(level, position ^ 1);
            if sibling == defaults[level] {
                default_bits[level / 8] |= 1 << (level % 8);
            } else {
                siblings.push(sibling);
            }
            position >>= 1;
        }

        Self {
            index,
            default_bits,
            siblings,
        }
    }

    fn is_default(&self, level: usize) -> bool {
        self.default_bits[level / 8] & (1 << (level % 8)) != 0
    }
}

/// Recompute the root committed to by `proof` for `leaf`.
///
/// Structural problems yield `InvalidProof`; no root comparison happens here.
pub fn compute_root(proof: &MerkleProof, leaf: &Hash, depth: u32) -> MerkleResult<Hash> {
    check_depth(depth)?;
    let levels = depth as usize;

    if proof.default_bits.len() != levels.div_ceil(8) {
        return Err(MerkleError::malformed(format!(
            "bit trail has {} bytes, depth {} needs {}",
            proof.default_bits.len(),
            depth,
            levels.div_ceil(8)
        )));
    }
    if !in_capacity(depth, proof.index) {
        return Err(MerkleError::malformed(format!(
            "index {} beyond depth {}",
            proof.index, depth
        )));
    }
    // Flags past the last level must be clear.
    let trailing = (levels..proof.default_bits.len() * 8)
        .any(|bit| proof.default_bits[bit / 8] & (1 << (bit % 8)) != 0);
    if trailing {
        return Err(MerkleError::malformed("flags set beyond tree depth"));
    }

    let defaults_used = (0..levels).filter(|&level| proof.is_default(level)).count();
    if proof.siblings.len() != levels - defaults_used {
        return Err(MerkleError::malformed(format!(
            "expected {} siblings, got {}",
            levels - defaults_used,
            proof.siblings.len()
        )));
    }

    let defaults = default_hashes(depth);
    let mut siblings = proof.siblings.iter();
    let mut node = *leaf;
    let mut position = proof.index;

    for (level, default) in defaults.iter().enumerate().take(levels) {
        let sibling = if proof.is_default(level) {
            default
        } else {
            siblings
                .next()
                .ok_or_else(|| MerkleError::malformed("sibling list exhausted"))?
        };
        node = if position & 1 == 0 {
            hash_pair(&node, sibling)
        } else {
            hash_pair(sibling, &node)
        };
        position >>= 1;
    }

    Ok(node)
}

/// Verify that `leaf` sits at `proof.index` under `root`.
pub fn verify(root: &Hash, proof: &MerkleProof, leaf: &Hash, depth: u32) -> MerkleResult<()> {
    if compute_root(proof, leaf, depth)? != *root {
        return Err(MerkleError::ProofMismatch);
    }
    Ok(())
}

/// A binary Merkle tree of fixed depth over a dense prefix of leaves.
///
/// Only the populated prefix of each level is stored; everything to the
/// right of it is the level's default hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    depth: u32,
    /// `levels[0]` are the leaves, `levels[depth]` holds at most the root.
    levels: Vec<Vec<Hash>>,
    defaults: Vec<Hash>,
}

impl MerkleTree {
    /// Build a tree of `depth` from `leaves` (positions `0..leaves.len()`).
    pub fn build(depth: u32, leaves: Vec<Hash>) -> MerkleResult<Self> {
        check_depth(depth)?;
        let count = leaves.len() as u64;
        if count > 0 && !in_capacity(depth, count - 1) {
            return Err(MerkleError::BatchFull {
                capacity: 1u64 << depth,
            });
        }

        let defaults = default_hashes(depth);
        let mut levels = Vec::with_capacity(depth as usize + 1);
        levels.push(leaves);

        for level in 0..depth as usize {
            let next: Vec<Hash> = levels[level]
                .chunks(2)
                .map(|pair| hash_pair(&pair[0], pair.get(1).unwrap_or(&defaults[level])))
                .collect();
            levels.push(next);
        }

        Ok(Self {
            depth,
            levels,
            defaults,
        })
    }

    pub fn root(&self) -> Hash {
        self.node(self.depth as usize, 0)
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of populated leaves.
    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    pub fn leaf(&self, index: u64) -> Option<Hash> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.levels[0].get(i).copied())
    }

    /// Proof for the leaf at `index`.
    pub fn proof(&self, index: u64) -> MerkleResult<MerkleProof> {
        if self.leaf(index).is_none() {
            return Err(MerkleError::UnknownLeaf(index));
        }
        Ok(MerkleProof::assemble(
            self.depth,
            index,
            &self.defaults,
            |level, position| self.node(level, position),
        ))
    }

    fn node(&self, level: usize, position: u64) -> Hash {
        usize::try_from(position)
            .ok()
            .and_then(|i| self.levels[level].get(i).copied())
            .unwrap_or(self.defaults[level])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::keccak256;

    fn leaves(n: u8) -> Vec<Hash> {
        (0..n).map(|i| keccak256(&[i])).collect()
    }

    #[test]
    fn test_empty_tree_root_is_top_default() {
        let tree = MerkleTree::build(8, vec![]).unwrap();
        assert_eq!(tree.root(), default_hashes(8)[8]);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_two_leaf_root_at_depth_one() {
        let l = leaves(2);
        let tree = MerkleTree::build(1, l.clone()).unwrap();
        assert_eq!(tree.root(), hash_pair(&l[0], &l[1]));
    }

    #[test]
    fn test_every_leaf_proof_verifies() {
        let l = leaves(5);
        let tree = MerkleTree::build(4, l.clone()).unwrap();
        for (i, leaf) in l.iter().enumerate() {
            let proof = tree.proof(i as u64).unwrap();
            assert_eq!(verify(&tree.root(), &proof, leaf, 4), Ok(()));
        }
    }

    #[test]
    fn test_sparse_tree_proof_omits_default_siblings() {
        let tree = MerkleTree::build(16, leaves(1)).unwrap();
        let proof = tree.proof(0).unwrap();
        assert!(proof.siblings.is_empty());
        assert_eq!(proof.default_bits, vec![0xFF, 0xFF]);
    }

    #[test]
    fn test_tampered_leaf_is_mismatch() {
        let l = leaves(3);
        let tree = MerkleTree::build(4, l).unwrap();
        let proof = tree.proof(1).unwrap();
        assert_eq!(
            verify(&tree.root(), &proof, &[0xAB; 32], 4),
            Err(MerkleError::ProofMismatch)
        );
    }

    #[test]
    fn test_wrong_bit_trail_length_is_malformed() {
        let tree = MerkleTree::build(9, leaves(3)).unwrap();
        let mut proof = tree.proof(0).unwrap();
        proof.default_bits.pop();
        assert!(matches!(
            verify(&tree.root(), &proof, &keccak256(&[0]), 9),
            Err(MerkleError::InvalidProof(_))
        ));
    }

    #[test]
    fn test_extra_sibling_is_malformed() {
        let tree = MerkleTree::build(4, leaves(3)).unwrap();
        let mut proof = tree.proof(0).unwrap();
        proof.siblings.push([1; 32]);
        assert!(matches!(
            verify(&tree.root(), &proof, &keccak256(&[0]), 4),
            Err(MerkleError::InvalidProof(_))
        ));
    }

    #[test]
    fn test_index_beyond_capacity_is_malformed() {
        let tree = MerkleTree::build(4, leaves(3)).unwrap();
        let mut proof = tree.proof(0).unwrap();
        proof.index = 16;
        assert!(matches!(
            verify(&tree.root(), &proof, &keccak256(&[0]), 4),
            Err(MerkleError::InvalidProof(_))
        ));
    }

    #[test]
    fn test_moved_index_is_mismatch() {
        let tree = MerkleTree::build(4, leaves(4)).unwrap();
        let mut proof = tree.proof(0).unwrap();
        proof.index = 1;
        assert_eq!(
            verify(&tree.root(), &proof, &keccak256(&[0]), 4),
            Err(MerkleError::ProofMismatch)
        );
    }

    #[test]
    fn test_overfull_tree_rejected() {
        assert_eq!(
            MerkleTree::build(2, leaves(5)),
            Err(MerkleError::BatchFull { capacity: 4 })
        );
    }

    #[test]
    fn test_proof_for_missing_leaf() {
        let tree = MerkleTree::build(4, leaves(2)).unwrap();
        assert_eq!(tree.proof(2), Err(MerkleError::UnknownLeaf(2)));
    }
}
