//! Block structure and header hashing
//!
//! The header hash is SHA-256 over the pipe-delimited concatenation
//! `index|previousHash|timestamp|merkleRoot|nonce|bits` with every numeric
//! field rendered as a decimal string. Timestamps are milliseconds since
//! epoch; the genesis block at height 0 uses previousHash "0".

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::core::target::hash_meets_bits;
use crate::core::transaction::Transaction;
use crate::crypto::hash::sha256_hex;
use crate::crypto::merkle::merkle_root_hex;

/// previousHash of the genesis block
pub const GENESIS_PREV_HASH: &str = "0";

/// Recipient of the genesis coinbase
pub const GENESIS_ADDRESS: &str = "genesis";

/// Block timestamps may run at most this far ahead of local time (2 hours)
pub const MAX_FUTURE_DRIFT_MS: u64 = 2 * 60 * 60 * 1000;

/// Current wall-clock time in milliseconds since epoch
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// A block: header fields plus an ordered transaction list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Height, 0-based
    pub index: u64,
    pub previous_hash: String,
    /// Milliseconds since epoch
    pub timestamp: u64,
    pub merkle_root: String,
    pub nonce: u64,
    /// Compact target
    pub bits: u32,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Assemble a block, computing the merkle root from the transaction list
    pub fn new(
        index: u64,
        previous_hash: String,
        timestamp: u64,
        nonce: u64,
        bits: u32,
        transactions: Vec<Transaction>,
    ) -> Self {
        let merkle_root = compute_merkle_root(&transactions);
        Self {
            index,
            previous_hash,
            timestamp,
            merkle_root,
            nonce,
            bits,
            transactions,
        }
    }

    /// The genesis block: one coinbase output of 0 to "genesis", written
    /// directly rather than mined
    pub fn genesis(bits: u32) -> Self {
        let coinbase = Transaction::coinbase(GENESIS_ADDRESS, 0);
        Self::new(
            0,
            GENESIS_PREV_HASH.to_string(),
            now_ms(),
            0,
            bits,
            vec![coinbase],
        )
    }

    /// SHA-256 over `index|previousHash|timestamp|merkleRoot|nonce|bits`
    pub fn header_hash(&self) -> String {
        let preimage = format!(
            "{}|{}|{}|{}|{}|{}",
            self.index, self.previous_hash, self.timestamp, self.merkle_root, self.nonce, self.bits
        );
        sha256_hex(preimage.as_bytes())
    }

    /// Recompute the merkle root from the contained transaction ids
    pub fn compute_merkle_root(&self) -> String {
        compute_merkle_root(&self.transactions)
    }

    /// Whether the header hash meets this block's own compact target
    pub fn meets_target(&self) -> bool {
        hash_meets_bits(&self.header_hash(), self.bits)
    }
}

fn compute_merkle_root(transactions: &[Transaction]) -> String {
    let ids: Vec<String> = transactions.iter().map(|tx| tx.id.clone()).collect();
    merkle_root_hex(&ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_shape() {
        let genesis = Block::genesis(0x1f00_ffff);
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, GENESIS_PREV_HASH);
        assert_eq!(genesis.bits, 0x1f00_ffff);
        assert_eq!(genesis.nonce, 0);
        assert_eq!(genesis.transactions.len(), 1);

        let coinbase = &genesis.transactions[0];
        assert!(coinbase.is_coinbase);
        assert_eq!(coinbase.outputs[0].address, GENESIS_ADDRESS);
        assert_eq!(coinbase.outputs[0].amount, 0);
        assert_eq!(genesis.merkle_root, genesis.compute_merkle_root());
    }

    #[test]
    fn test_header_hash_is_pipe_delimited_decimal() {
        let block = Block {
            index: 7,
            previous_hash: "abc".to_string(),
            timestamp: 1_700_000_000_000,
            merkle_root: "def".to_string(),
            nonce: 42,
            bits: 0x1f00_ffff,
            transactions: vec![],
        };
        let expected = sha256_hex(
            format!("7|abc|1700000000000|def|42|{}", 0x1f00_ffffu32).as_bytes(),
        );
        assert_eq!(block.header_hash(), expected);
    }

    #[test]
    fn test_header_hash_changes_with_nonce() {
        let mut block = Block::genesis(0x1f00_ffff);
        let before = block.header_hash();
        block.nonce += 1;
        assert_ne!(block.header_hash(), before);
    }

    #[test]
    fn test_merkle_root_follows_tx_ids() {
        let mut block = Block::new(
            1,
            "prev".to_string(),
            now_ms(),
            0,
            0x1f00_ffff,
            vec![Transaction::coinbase("miner", 50)],
        );
        assert_eq!(block.merkle_root, block.compute_merkle_root());

        block.transactions[0].id = "00".repeat(32);
        assert_ne!(block.merkle_root, block.compute_merkle_root());
    }

    #[test]
    fn test_meets_target_tracks_bits() {
        let mut block = Block::genesis(crate::core::target::MAX_BITS);
        while !block.meets_target() {
            block.nonce += 1;
        }
        assert!(block.meets_target());

        // The same header against a target of 1 cannot pass
        block.bits = 0x0300_0001;
        assert!(!block.meets_target());
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let value = serde_json::to_value(Block::genesis(0x1f00_ffff)).unwrap();
        assert!(value.get("previousHash").is_some());
        assert!(value.get("merkleRoot").is_some());
        assert!(value.get("bits").is_some());
    }
}
