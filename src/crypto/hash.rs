//! Hashing primitives used across the node
//!
//! SHA-256 for block hashes, transaction ids and merkle trees;
//! RIPEMD-160 for address derivation.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Computes the SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes the SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Computes the RIPEMD-160 hash of the input data
pub fn ripemd160(data: &[u8]) -> Vec<u8> {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Derives an address from a hex-encoded compressed public key.
///
/// The address is `hex(ripemd160(sha256(pubkey_bytes)))`, 40 lowercase hex
/// characters. Returns `None` when the public key is not valid hex; callers
/// treat that the same as a key that does not match.
pub fn address_from_pub_key(pub_key_hex: &str) -> Option<String> {
    let bytes = hex::decode(pub_key_hex).ok()?;
    Some(hex::encode(ripemd160(&sha256(&bytes))))
}
