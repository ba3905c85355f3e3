//! Transaction pool for validated, unconfirmed transactions
//!
//! Admission validates against the live UTXO set and reserves every spent
//! outpoint, so a second transaction spending any reserved outpoint is
//! rejected without scanning the pool. Insertion order is kept for block
//! candidate selection.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::core::block::Block;
use crate::core::blockchain::Blockchain;
use crate::core::transaction::{Outpoint, Transaction, TxError};
use crate::core::utxo::UtxoSet;

/// Mempool admission failures
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MempoolError {
    #[error("mempool double spend")]
    DoubleSpend,
    #[error("coinbase cannot enter the mempool")]
    Coinbase,
    #[error(transparent)]
    Invalid(#[from] TxError),
}

/// In-memory pool of pending transactions
#[derive(Debug, Default)]
pub struct Mempool {
    entries: HashMap<String, Transaction>,
    /// Ids in admission order, for candidate selection
    order: Vec<String>,
    /// Outpoints claimed by some pool entry
    reserved: HashSet<Outpoint>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a transaction: assign its canonical id, validate it against the
    /// chain (maturity measured in confirmations from the tip), and reserve
    /// its outpoints.
    ///
    /// Re-submitting a pooled transaction is an idempotent success.
    pub fn admit(
        &mut self,
        mut tx: Transaction,
        chain: &Blockchain,
    ) -> Result<String, MempoolError> {
        if tx.is_coinbase {
            return Err(MempoolError::Coinbase);
        }

        tx.id = tx.compute_id();
        let tip_height = chain.tip().map(|block| block.index).unwrap_or(0);
        chain.validate_tx(&tx, tip_height)?;

        if self.entries.contains_key(&tx.id) {
            return Ok(tx.id);
        }
        if tx
            .inputs
            .iter()
            .any(|input| self.reserved.contains(&input.outpoint()))
        {
            return Err(MempoolError::DoubleSpend);
        }

        for input in &tx.inputs {
            self.reserved.insert(input.outpoint());
        }
        let id = tx.id.clone();
        self.order.push(id.clone());
        self.entries.insert(id.clone(), tx);
        Ok(id)
    }

    /// Drop every pool entry included in an accepted block, releasing its
    /// outpoint reservations
    pub fn remove_mined(&mut self, block: &Block) {
        for tx in &block.transactions {
            self.remove(&tx.id);
        }
    }

    /// Drop entries whose inputs no longer exist in the UTXO set, orphaned
    /// by a block that spent the same outpoint through a different
    /// transaction
    pub fn drop_conflicting(&mut self, utxo: &UtxoSet) {
        let orphaned: Vec<String> = self
            .entries
            .values()
            .filter(|tx| tx.inputs.iter().any(|input| !utxo.contains(&input.outpoint())))
            .map(|tx| tx.id.clone())
            .collect();

        for id in orphaned {
            log::debug!("dropping orphaned mempool tx {id}");
            self.remove(&id);
        }
    }

    fn remove(&mut self, id: &str) {
        if let Some(tx) = self.entries.remove(id) {
            self.order.retain(|entry| entry != id);
            for input in &tx.inputs {
                self.reserved.remove(&input.outpoint());
            }
        }
    }

    /// Pool entries in admission order
    pub fn ordered(&self) -> Vec<&Transaction> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn is_reserved(&self, outpoint: &Outpoint) -> bool {
        self.reserved.contains(outpoint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
