//! # ECDSA Signatures (secp256k1)
//!
//! Recoverable secp256k1 signatures in the 65-byte `r || s || v` layout.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Low-S normalization (EIP-2); high-S signatures are rejected on recovery
//!
//! ## Use Cases
//!
//! - Batch submission signatures (operator signer)
//! - Spend signatures on transfer inputs
//! - Exit sale authorizations and heartbeats

use crate::hashing::keccak256;
use crate::CryptoError;
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use shared_types::{Address, Hash, Signature};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// secp256k1 ECDSA keypair.
///
/// The secret scalar is wiped when the key is dropped.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(mut bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key = SigningKey::from_bytes((&bytes).into());
        bytes.zeroize();
        let signing_key = signing_key.map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Ethereum-style address of this key.
    pub fn address(&self) -> Address {
        address_from_pubkey(self.signing_key.verifying_key())
    }

    /// Sign a 32-byte message hash, producing `r || s || v` with `v = recid + 27`.
    pub fn sign_hash(&self, message_hash: &Hash) -> Result<Signature, CryptoError> {
        let (sig, recid) = self
            .signing_key
            .sign_prehash_recoverable(message_hash)
            .map_err(|_| CryptoError::SigningFailed)?;

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recid.to_byte() + 27;
        Ok(out)
    }

    /// Get secret key bytes (for serialization).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

// `SigningKey` zeroizes its scalar in place on drop.
impl ZeroizeOnDrop for Secp256k1KeyPair {}

/// Recover the signer address of `signature` over `message_hash`.
pub fn recover_signer(message_hash: &Hash, signature: &Signature) -> Result<Address, CryptoError> {
    let recovery_id = parse_recovery_id(signature[64])?;

    let sig = K256Signature::from_slice(&signature[..64])
        .map_err(|_| CryptoError::InvalidSignatureFormat)?;

    // normalize_s yields Some only for high-S input
    if sig.normalize_s().is_some() {
        return Err(CryptoError::MalleableSignature);
    }

    let recovered_key = VerifyingKey::recover_from_prehash(message_hash, &sig, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;

    Ok(address_from_pubkey(&recovered_key))
}

/// Derive Ethereum address from public key.
pub fn address_from_pubkey(public_key: &VerifyingKey) -> Address {
    let pubkey_bytes = public_key.to_encoded_point(false);
    let pubkey_slice = pubkey_bytes.as_bytes();

    // Keccak256 hash of public key (without 0x04 prefix)
    let hash = keccak256(&pubkey_slice[1..]);

    // Take last 20 bytes as address
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// Parse recovery ID from v value.
///
/// Valid v values: 0, 1, 27, 28
fn parse_recovery_id(v: u8) -> Result<RecoveryId, CryptoError> {
    let id = match v {
        0 | 27 => 0,
        1 | 28 => 1,
        _ => return Err(CryptoError::InvalidRecoveryId(v)),
    };

    RecoveryId::try_from(id).map_err(|_| CryptoError::InvalidRecoveryId(v))
}
