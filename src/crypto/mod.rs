//! Cryptographic primitives: hashing, keys, signatures, merkle trees

pub mod hash;
pub mod keys;
pub mod merkle;

pub use hash::{address_from_pub_key, ripemd160, sha256, sha256_hex};
pub use keys::{verify_signature, KeyError, KeyPair};
pub use merkle::{merkle_root, merkle_root_hex};
