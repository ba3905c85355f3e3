//! Consensus core: blocks, transactions, targets, the UTXO index and the
//! validation engine

pub mod block;
pub mod blockchain;
pub mod target;
pub mod transaction;
pub mod utxo;

pub use block::Block;
pub use blockchain::{BlockError, Blockchain};
pub use transaction::{Outpoint, Transaction, TxError, TxInput, TxOutput};
pub use utxo::{UtxoEntry, UtxoSet};
