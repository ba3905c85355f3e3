//! Transaction model, identity and signing preimage
//!
//! A transaction is either a coinbase (marker set, no inputs) or a spend of
//! previous outputs. Its id is SHA-256 over a canonical JSON form that
//! excludes signatures, so re-signing by the same key set never changes the
//! id. Every input signs the same sighash-ALL preimage, which additionally
//! excludes public keys.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::crypto::hash::{sha256, sha256_hex};
use crate::crypto::keys::{KeyError, KeyPair};

/// Rule violations detected by transaction validation
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TxError {
    #[error("coinbase must not have inputs")]
    CoinbaseHasInputs,
    #[error("transaction has no inputs")]
    NoInputs,
    #[error("transaction has no outputs")]
    NoOutputs,
    #[error("output amount must be positive")]
    ZeroOutput,
    #[error("duplicate outpoint {0} within transaction")]
    DuplicateOutpoint(String),
    #[error("unknown utxo {0}")]
    UnknownUtxo(String),
    #[error("coinbase not mature")]
    ImmatureCoinbase,
    #[error("pubkey does not match utxo address")]
    AddressMismatch,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("outputs exceed inputs")]
    OutputsExceedInputs,
    #[error("value overflow")]
    ValueOverflow,
}

/// Reference to one previous transaction output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Outpoint {
    pub txid: String,
    pub index: u32,
}

impl Outpoint {
    pub fn new(txid: impl Into<String>, index: u32) -> Self {
        Self {
            txid: txid.into(),
            index,
        }
    }

    /// The map-key form, `"txid:index"`
    pub fn key(&self) -> String {
        format!("{}:{}", self.txid, self.index)
    }
}

/// Transaction input: an outpoint plus the spender's credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TxInput {
    /// Transaction id of the output being spent
    pub txid: String,
    /// Output index within that transaction
    pub index: u32,
    /// Compressed secp256k1 public key, hex
    #[serde(default)]
    pub pub_key: String,
    /// DER ECDSA signature over the signing preimage, hex
    #[serde(default)]
    pub sig: String,
}

impl TxInput {
    pub fn outpoint(&self) -> Outpoint {
        Outpoint::new(self.txid.clone(), self.index)
    }
}

/// Transaction output: an address and a positive amount
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TxOutput {
    pub address: String,
    pub amount: u64,
}

/// A coinbase or spend transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Deterministic id; recomputed on admission, may be absent on submission
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub is_coinbase: bool,
    #[serde(default)]
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Create a spend transaction; the id is computed immediately
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let mut tx = Self {
            id: String::new(),
            is_coinbase: false,
            inputs,
            outputs,
        };
        tx.id = tx.compute_id();
        tx
    }

    /// Create a coinbase transaction paying `amount` to `recipient`
    pub fn coinbase(recipient: &str, amount: u64) -> Self {
        let mut tx = Self {
            id: String::new(),
            is_coinbase: true,
            inputs: Vec::new(),
            outputs: vec![TxOutput {
                address: recipient.to_string(),
                amount,
            }],
        };
        tx.id = tx.compute_id();
        tx
    }

    /// Compute the transaction id.
    ///
    /// SHA-256 over canonical JSON of, per input, only (txid, index, pubKey)
    /// and, per output, (address, amount). Signatures are excluded, so the id
    /// is stable across re-signing by the same key set.
    pub fn compute_id(&self) -> String {
        let inputs: Vec<serde_json::Value> = self
            .inputs
            .iter()
            .map(|i| json!({ "txid": i.txid, "index": i.index, "pubKey": i.pub_key }))
            .collect();
        sha256_hex(self.canonical(inputs).as_bytes())
    }

    /// Compute the sighash-ALL signing preimage.
    ///
    /// SHA-256 over canonical JSON of, per input, only (txid, index) and, per
    /// output, (address, amount). Every input signs this same digest.
    pub fn signing_preimage(&self) -> Vec<u8> {
        let inputs: Vec<serde_json::Value> = self
            .inputs
            .iter()
            .map(|i| json!({ "txid": i.txid, "index": i.index }))
            .collect();
        sha256(self.canonical(inputs).as_bytes())
    }

    fn canonical(&self, inputs: Vec<serde_json::Value>) -> String {
        let outputs: Vec<serde_json::Value> = self
            .outputs
            .iter()
            .map(|o| json!({ "address": o.address, "amount": o.amount }))
            .collect();
        json!({ "inputs": inputs, "outputs": outputs }).to_string()
    }

    /// Sign every input with the same key and recompute the id
    pub fn sign_inputs(&mut self, key_pair: &KeyPair) -> Result<(), KeyError> {
        let preimage = self.signing_preimage();
        let pub_key = key_pair.public_key_hex();
        let sig = key_pair.sign(&preimage)?;

        for input in &mut self.inputs {
            input.pub_key = pub_key.clone();
            input.sig = sig.clone();
        }

        self.id = self.compute_id();
        Ok(())
    }

    /// Sum of all output amounts
    pub fn total_output(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    /// Stateless shape checks shared by mempool and block validation.
    ///
    /// Coinbase: no inputs, at least one positive output. Spend: at least one
    /// input and one output, all outputs positive, no outpoint referenced
    /// twice.
    pub fn check_shape(&self) -> Result<(), TxError> {
        if self.is_coinbase {
            if !self.inputs.is_empty() {
                return Err(TxError::CoinbaseHasInputs);
            }
        } else if self.inputs.is_empty() {
            return Err(TxError::NoInputs);
        }

        if self.outputs.is_empty() {
            return Err(TxError::NoOutputs);
        }
        if self.outputs.iter().any(|o| o.amount == 0) {
            return Err(TxError::ZeroOutput);
        }

        let mut seen = std::collections::HashSet::new();
        for input in &self.inputs {
            if !seen.insert(input.outpoint()) {
                return Err(TxError::DuplicateOutpoint(input.outpoint().key()));
            }
        }

        Ok(())
    }
}
