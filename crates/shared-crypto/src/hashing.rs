//! # Keccak-256 Hashing
//!
//! Every hash in the settlement core is Keccak-256 (the pre-standard SHA-3
//! variant used by Ethereum-style root chains).

use sha3::{Digest, Keccak256};
use shared_types::Hash;

pub use shared_types::{keccak256, keccak256_concat};

/// Hash two 32-byte nodes: `keccak(left || right)`.
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_empty_vector() {
        // Well-known Keccak-256 of the empty string.
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_hash_pair_matches_concat() {
        let left = [1u8; 32];
        let right = [2u8; 32];
        assert_eq!(hash_pair(&left, &right), keccak256_concat(&[&left, &right]));
        assert_ne!(hash_pair(&left, &right), hash_pair(&right, &left));
    }
}
