//! Chain state and validation engine
//!
//! Owns the block list, the UTXO set and the consensus parameters, and
//! enforces every consensus rule: transaction validity, block contiguity,
//! merkle integrity, proof of work, coinbase bounds and difficulty
//! retargeting. Only blocks extending the current tip are accepted; competing
//! tips are detected and rejected, never reorganized onto.

use num_bigint::BigUint;
use thiserror::Error;

use crate::config::ConsensusConfig;
use crate::core::block::{Block, now_ms, GENESIS_PREV_HASH, MAX_FUTURE_DRIFT_MS};
use crate::core::target::{bits_to_target, max_target, target_to_bits};
use crate::core::transaction::{Transaction, TxError};
use crate::core::utxo::UtxoSet;
use crate::crypto::hash::address_from_pub_key;
use crate::crypto::keys::verify_signature;

/// Rule violations detected by block validation
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BlockError {
    #[error("invalid block index: expected {expected}, got {got}")]
    BadIndex { expected: u64, got: u64 },
    #[error("previous hash mismatch")]
    PrevHashMismatch,
    #[error("block timestamp too far in the future")]
    TimestampTooFar,
    #[error("transaction id mismatch")]
    TxIdMismatch,
    #[error("merkle root mismatch")]
    MerkleMismatch,
    #[error("insufficient proof of work")]
    InsufficientPow,
    #[error("coinbase must be the first transaction")]
    CoinbaseNotFirst,
    #[error("block must contain exactly one coinbase, found {0}")]
    CoinbaseCount(usize),
    #[error("coinbase overpays: {got} > {allowed}")]
    CoinbaseOverpays { got: u64, allowed: u64 },
    #[error(transparent)]
    Tx(#[from] TxError),
}

/// The chain, its UTXO index and the live consensus parameters
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    pub utxo: UtxoSet,
    pub config: ConsensusConfig,
}

impl Blockchain {
    /// An empty chain; blocks arrive via [`replay_block`](Self::replay_block)
    /// (startup) or [`connect_block`](Self::connect_block) (submission)
    pub fn new(config: ConsensusConfig) -> Self {
        Self {
            blocks: Vec::new(),
            utxo: UtxoSet::new(),
            config,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks on the chain
    pub fn block_count(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// The last block, if any
    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn block_at(&self, height: u64) -> Option<&Block> {
        self.blocks.get(height as usize)
    }

    /// Block reward at a height: the base subsidy halved every
    /// `halvingInterval` blocks, clamped at zero
    pub fn subsidy(&self, height: u64) -> u64 {
        let halvings = height / self.config.halving_interval;
        if halvings >= 64 {
            0
        } else {
            self.config.block_subsidy >> halvings
        }
    }

    /// Find a confirmed transaction and the height of its block
    pub fn find_tx(&self, id: &str) -> Option<(&Transaction, u64)> {
        self.blocks.iter().find_map(|block| {
            block
                .transactions
                .iter()
                .find(|tx| tx.id == id)
                .map(|tx| (tx, block.index))
        })
    }

    /// Validate a transaction against the live UTXO set.
    ///
    /// `current_height` is the height maturity is measured from: the tip
    /// height for mempool admission, the containing block's index inside
    /// block validation. Returns the fee (inputs minus outputs, zero for a
    /// coinbase).
    pub fn validate_tx(&self, tx: &Transaction, current_height: u64) -> Result<u64, TxError> {
        validate_tx_against(
            &self.utxo,
            tx,
            current_height,
            self.config.coinbase_maturity,
        )
    }

    /// Validate a block against the current tip and, on success, commit it:
    /// the UTXO set advances atomically and the block joins the chain.
    ///
    /// Failure leaves the live state untouched. Returns the block's height.
    pub fn connect_block(&mut self, block: &Block) -> Result<u64, BlockError> {
        match self.tip() {
            None => {
                if block.index != 0 {
                    return Err(BlockError::BadIndex {
                        expected: 0,
                        got: block.index,
                    });
                }
                if block.previous_hash != GENESIS_PREV_HASH {
                    return Err(BlockError::PrevHashMismatch);
                }
            }
            Some(tip) => {
                let expected = tip.index + 1;
                if block.index != expected {
                    return Err(BlockError::BadIndex {
                        expected,
                        got: block.index,
                    });
                }
                if block.previous_hash != tip.header_hash() {
                    // A same-height block with a different parent is a fork;
                    // this node never switches tips.
                    log::warn!(
                        "rejecting block {} with unknown parent {}",
                        block.index,
                        block.previous_hash
                    );
                    return Err(BlockError::PrevHashMismatch);
                }
            }
        }

        if block.timestamp > now_ms() + MAX_FUTURE_DRIFT_MS {
            return Err(BlockError::TimestampTooFar);
        }

        // The merkle root commits to the ids, and the ids commit to the
        // content; a block carrying forged id fields must not pass either.
        for tx in &block.transactions {
            if tx.id != tx.compute_id() {
                return Err(BlockError::TxIdMismatch);
            }
        }
        if block.compute_merkle_root() != block.merkle_root {
            return Err(BlockError::MerkleMismatch);
        }

        if !block.meets_target() {
            return Err(BlockError::InsufficientPow);
        }

        // Walk the transactions against a snapshot so a failed block leaves
        // live state untouched and intra-block child-after-parent spends
        // resolve.
        let mut temp = self.utxo.clone();
        let mut coinbase_count = 0usize;
        let mut coinbase_total = 0u64;
        let mut fees = 0u64;

        for (position, tx) in block.transactions.iter().enumerate() {
            if tx.is_coinbase {
                tx.check_shape()?;
                if position != 0 {
                    return Err(BlockError::CoinbaseNotFirst);
                }
                coinbase_count += 1;
                coinbase_total = checked_output_sum(tx)?;
            } else {
                let fee = validate_tx_against(
                    &temp,
                    tx,
                    block.index,
                    self.config.coinbase_maturity,
                )?;
                fees = fees.checked_add(fee).ok_or(TxError::ValueOverflow)?;
            }
            temp.apply_transaction(tx, block.index);
        }

        if coinbase_count != 1 {
            return Err(BlockError::CoinbaseCount(coinbase_count));
        }
        let allowed = self
            .subsidy(block.index)
            .checked_add(fees)
            .ok_or(TxError::ValueOverflow)?;
        if coinbase_total > allowed {
            return Err(BlockError::CoinbaseOverpays {
                got: coinbase_total,
                allowed,
            });
        }

        self.utxo = temp;
        self.blocks.push(block.clone());
        Ok(block.index)
    }

    /// Append a block loaded from disk, applying it to the UTXO set.
    ///
    /// Only contiguity is checked; full consensus validation already ran
    /// when the block was first accepted.
    pub fn replay_block(&mut self, block: Block) -> Result<(), BlockError> {
        match self.tip() {
            None => {
                if block.index != 0 {
                    return Err(BlockError::BadIndex {
                        expected: 0,
                        got: block.index,
                    });
                }
            }
            Some(tip) => {
                if block.index != tip.index + 1 {
                    return Err(BlockError::BadIndex {
                        expected: tip.index + 1,
                        got: block.index,
                    });
                }
                if block.previous_hash != tip.header_hash() {
                    return Err(BlockError::PrevHashMismatch);
                }
            }
        }

        self.utxo.apply_block(&block);
        self.blocks.push(block);
        Ok(())
    }

    /// Clear the UTXO set and replay every block from genesis
    pub fn rebuild_utxo(&mut self) {
        self.utxo.clear();
        let blocks = std::mem::take(&mut self.blocks);
        for block in &blocks {
            self.utxo.apply_block(block);
        }
        self.blocks = blocks;
    }

    /// Run the difficulty retargeter for the block just accepted.
    ///
    /// Fires when the tip height is a positive multiple of `adjustEvery`.
    /// The new target is `old_target * actual / expected` with the time
    /// ratio clamped to [1/4, 4], computed entirely in 256-bit integers and
    /// clamped to [1, max encodable target] before re-encoding. Returns the
    /// new bits when an adjustment happened.
    pub fn maybe_retarget(&mut self) -> Option<u32> {
        let tip = self.tip()?;
        let height = tip.index;
        let window = self.config.adjust_every;
        if height == 0 || height % window != 0 {
            return None;
        }

        let anchor = &self.blocks[(height - window) as usize];
        let actual_sec = (tip.timestamp.saturating_sub(anchor.timestamp) / 1000).max(1);
        let expected_sec = window * self.config.target_block_time_sec;

        let old_target = bits_to_target(self.config.bits);
        let mut new_target = if actual_sec * 4 <= expected_sec {
            // Blocks at least 4x too fast: target shrinks by the clamp limit
            &old_target / 4u64
        } else if actual_sec >= expected_sec * 4 {
            // Blocks at least 4x too slow: target grows by the clamp limit
            &old_target * 4u64
        } else {
            (&old_target * actual_sec) / expected_sec
        };

        if new_target == BigUint::from(0u8) {
            new_target = BigUint::from(1u8);
        }
        let ceiling = max_target();
        if new_target > ceiling {
            new_target = ceiling;
        }

        let new_bits = target_to_bits(&new_target);
        log::info!(
            "retarget at height {}: bits {:#010x} -> {:#010x} (actual {}s, expected {}s)",
            height,
            self.config.bits,
            new_bits,
            actual_sec,
            expected_sec
        );

        self.config.bits = new_bits;
        Some(new_bits)
    }
}

/// Validate a transaction against an arbitrary UTXO view.
///
/// Block validation passes its in-progress snapshot here so intra-block
/// dependencies resolve; mempool admission passes the live set.
fn validate_tx_against(
    utxo: &UtxoSet,
    tx: &Transaction,
    current_height: u64,
    coinbase_maturity: u64,
) -> Result<u64, TxError> {
    tx.check_shape()?;

    if tx.is_coinbase {
        return Ok(0);
    }

    let preimage = tx.signing_preimage();
    let mut total_in = 0u64;

    for input in &tx.inputs {
        let outpoint = input.outpoint();
        let entry = utxo
            .get(&outpoint)
            .ok_or_else(|| TxError::UnknownUtxo(outpoint.key()))?;

        if entry.is_coinbase
            && current_height.saturating_sub(entry.block_height) < coinbase_maturity
        {
            return Err(TxError::ImmatureCoinbase);
        }

        let address =
            address_from_pub_key(&input.pub_key).ok_or(TxError::InvalidSignature)?;
        if address != entry.address {
            return Err(TxError::AddressMismatch);
        }
        if !verify_signature(&input.pub_key, &preimage, &input.sig) {
            return Err(TxError::InvalidSignature);
        }

        total_in = total_in
            .checked_add(entry.amount)
            .ok_or(TxError::ValueOverflow)?;
    }

    let total_out = checked_output_sum(tx)?;
    if total_in < total_out {
        return Err(TxError::OutputsExceedInputs);
    }
    Ok(total_in - total_out)
}

fn checked_output_sum(tx: &Transaction) -> Result<u64, TxError> {
    tx.outputs.iter().try_fold(0u64, |sum, output| {
        sum.checked_add(output.amount).ok_or(TxError::ValueOverflow)
    })
}
