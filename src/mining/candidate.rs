//! Block-candidate assembly for external miners
//!
//! Produces an unsolved block: coinbase first, then up to `maxBlockTx`
//! mempool entries in admission order. The miner grinds the nonce and posts
//! the solved block back through the ingress API.

use thiserror::Error;

use crate::core::block::{now_ms, Block};
use crate::core::blockchain::Blockchain;
use crate::core::transaction::Transaction;
use crate::mining::mempool::Mempool;

#[derive(Error, Debug)]
pub enum CandidateError {
    #[error("chain has no tip")]
    NoTip,
}

/// Assemble an unsolved block paying `miner_address` the subsidy plus the
/// fees of the selected pool entries. Fees are computed against the current
/// UTXO set; entries that no longer validate are skipped.
pub fn build_candidate(
    chain: &Blockchain,
    mempool: &Mempool,
    miner_address: &str,
) -> Result<Block, CandidateError> {
    let tip = chain.tip().ok_or(CandidateError::NoTip)?;
    let height = tip.index + 1;

    let mut selected: Vec<Transaction> = Vec::new();
    let mut fees = 0u64;
    for tx in mempool.ordered() {
        if selected.len() >= chain.config.max_block_tx {
            break;
        }
        match chain.validate_tx(tx, height) {
            Ok(fee) => {
                fees = fees.saturating_add(fee);
                selected.push(tx.clone());
            }
            Err(e) => log::debug!("skipping pool tx {} for candidate: {e}", tx.id),
        }
    }

    let reward = chain.subsidy(height).saturating_add(fees);
    let mut transactions = vec![Transaction::coinbase(miner_address, reward)];
    transactions.extend(selected);

    Ok(Block::new(
        height,
        tip.header_hash(),
        now_ms(),
        0,
        chain.config.bits,
        transactions,
    ))
}
