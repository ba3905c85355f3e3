//! ECDSA key management
//!
//! Key pair generation, DER signing and signature verification on the
//! secp256k1 curve (same as Bitcoin).

use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::{ripemd160, sha256};

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A secp256k1 key pair
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key = SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Derive the node address: hex(RIPEMD160(SHA256(compressed pubkey)))
    pub fn address(&self) -> String {
        hex::encode(ripemd160(&sha256(&self.public_key.serialize())))
    }

    /// Sign a 32-byte message hash, returning the DER signature as hex
    pub fn sign(&self, message_hash: &[u8]) -> Result<String, KeyError> {
        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(message_hash)?;
        let signature = secp.sign_ecdsa(&message, &self.secret_key);
        Ok(hex::encode(signature.serialize_der()))
    }
}

/// Verify a hex DER signature over a 32-byte message hash against a
/// hex-encoded compressed public key.
///
/// Every decode failure (bad hex, malformed key, malformed DER) is reported
/// as `false`: an unverifiable signature is an invalid signature, never a
/// crash.
pub fn verify_signature(pub_key_hex: &str, message_hash: &[u8], sig_der_hex: &str) -> bool {
    let key_bytes = match hex::decode(pub_key_hex) {
        Ok(b) => b,
        Err(_) => return false,
    };
    let public_key = match PublicKey::from_slice(&key_bytes) {
        Ok(k) => k,
        Err(_) => return false,
    };
    let sig_bytes = match hex::decode(sig_der_hex) {
        Ok(b) => b,
        Err(_) => return false,
    };
    let signature = match secp256k1::ecdsa::Signature::from_der(&sig_bytes) {
        Ok(s) => s,
        Err(_) => return false,
    };
    let message = match Message::from_digest_slice(message_hash) {
        Ok(m) => m,
        Err(_) => return false,
    };

    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&message, &signature, &public_key).is_ok()
}
