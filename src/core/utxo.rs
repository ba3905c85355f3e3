//! Unspent transaction output index
//!
//! The authoritative balance state: every entry was created by some block on
//! the chain and spent by none. The whole set is rebuildable by replaying the
//! chain from genesis.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::block::Block;
use crate::core::transaction::{Outpoint, Transaction};

/// One spendable output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UtxoEntry {
    pub amount: u64,
    pub address: String,
    /// Height of the block that created this output
    pub block_height: u64,
    pub is_coinbase: bool,
}

/// The UTXO set, keyed by outpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UtxoSet {
    entries: HashMap<Outpoint, UtxoEntry>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, outpoint: &Outpoint) -> Option<&UtxoEntry> {
        self.entries.get(outpoint)
    }

    pub fn contains(&self, outpoint: &Outpoint) -> bool {
        self.entries.contains_key(outpoint)
    }

    pub fn remove(&mut self, outpoint: &Outpoint) -> Option<UtxoEntry> {
        self.entries.remove(outpoint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Apply one transaction: consume its inputs, create its outputs
    pub fn apply_transaction(&mut self, tx: &Transaction, block_height: u64) {
        for input in &tx.inputs {
            self.entries.remove(&input.outpoint());
        }
        for (index, output) in tx.outputs.iter().enumerate() {
            self.entries.insert(
                Outpoint::new(tx.id.clone(), index as u32),
                UtxoEntry {
                    amount: output.amount,
                    address: output.address.clone(),
                    block_height,
                    is_coinbase: tx.is_coinbase,
                },
            );
        }
    }

    /// Apply every transaction of a block in order
    pub fn apply_block(&mut self, block: &Block) {
        for tx in &block.transactions {
            self.apply_transaction(tx, block.index);
        }
    }

    /// All entries paying the given address, in no particular order
    pub fn for_address(&self, address: &str) -> Vec<(Outpoint, UtxoEntry)> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.address == address)
            .map(|(outpoint, entry)| (outpoint.clone(), entry.clone()))
            .collect()
    }

    /// Total value held by an address
    pub fn balance(&self, address: &str) -> u64 {
        self.entries
            .values()
            .filter(|entry| entry.address == address)
            .map(|entry| entry.amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::{TxInput, TxOutput};

    fn coinbase_at(addr: &str, amount: u64) -> Transaction {
        Transaction::coinbase(addr, amount)
    }

    #[test]
    fn test_apply_coinbase_creates_entries() {
        let mut utxo = UtxoSet::new();
        let tx = coinbase_at("alice", 50);
        utxo.apply_transaction(&tx, 3);

        let entry = utxo.get(&Outpoint::new(tx.id.clone(), 0)).unwrap();
        assert_eq!(entry.amount, 50);
        assert_eq!(entry.address, "alice");
        assert_eq!(entry.block_height, 3);
        assert!(entry.is_coinbase);
    }

    #[test]
    fn test_apply_spend_consumes_inputs() {
        let mut utxo = UtxoSet::new();
        let mint = coinbase_at("alice", 50);
        utxo.apply_transaction(&mint, 1);

        let spend = Transaction::new(
            vec![TxInput {
                txid: mint.id.clone(),
                index: 0,
                pub_key: String::new(),
                sig: String::new(),
            }],
            vec![TxOutput {
                address: "bob".to_string(),
                amount: 50,
            }],
        );
        utxo.apply_transaction(&spend, 2);

        assert!(!utxo.contains(&Outpoint::new(mint.id.clone(), 0)));
        let entry = utxo.get(&Outpoint::new(spend.id.clone(), 0)).unwrap();
        assert_eq!(entry.address, "bob");
        assert!(!entry.is_coinbase);
        assert_eq!(entry.block_height, 2);
    }

    #[test]
    fn test_for_address_and_balance() {
        let mut utxo = UtxoSet::new();
        utxo.apply_transaction(&coinbase_at("alice", 50), 1);
        utxo.apply_transaction(&coinbase_at("alice", 25), 2);
        utxo.apply_transaction(&coinbase_at("bob", 10), 3);

        assert_eq!(utxo.for_address("alice").len(), 2);
        assert_eq!(utxo.balance("alice"), 75);
        assert_eq!(utxo.balance("bob"), 10);
        assert_eq!(utxo.balance("nobody"), 0);
    }
}
