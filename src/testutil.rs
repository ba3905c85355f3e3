//! Shared helpers for unit tests: a small consensus config, a pre-seeded
//! chain, block solving and signed-spend construction.

use crate::config::ConsensusConfig;
use crate::core::block::{now_ms, Block};
use crate::core::blockchain::Blockchain;
use crate::core::target::MAX_BITS;
use crate::core::transaction::{Transaction, TxInput, TxOutput};
use crate::crypto::keys::KeyPair;

/// Testbed parameters: tiny halving interval and maturity so every rule is
/// reachable in a handful of blocks; the loosest possible target so solving
/// takes a nonce or two.
pub fn test_config() -> ConsensusConfig {
    ConsensusConfig {
        adjust_every: 10,
        target_block_time_sec: 10,
        block_subsidy: 50,
        halving_interval: 4,
        coinbase_maturity: 2,
        max_block_tx: 10,
        bits: MAX_BITS,
    }
}

/// A chain holding only the genesis block, under [`test_config`]
pub fn test_chain() -> Blockchain {
    let config = test_config();
    let mut chain = Blockchain::new(config.clone());
    chain
        .replay_block(Block::genesis(config.bits))
        .expect("genesis replays onto an empty chain");
    chain
}

/// Grind the nonce until the header hash meets the block's own bits
pub fn solve(block: &mut Block) {
    while !block.meets_target() {
        block.nonce += 1;
    }
}

/// Build and solve the next block: a coinbase paying `miner` subsidy plus the
/// fees of `txs`, followed by `txs` themselves. Each tx must spend the live
/// UTXO set.
pub fn next_block(chain: &Blockchain, txs: Vec<Transaction>, miner: &str) -> Block {
    let tip = chain.tip().expect("chain has a tip");
    let height = tip.index + 1;
    let fees: u64 = txs
        .iter()
        .map(|tx| chain.validate_tx(tx, height).expect("tx valid against chain"))
        .sum();

    let mut transactions = vec![Transaction::coinbase(miner, chain.subsidy(height) + fees)];
    transactions.extend(txs);

    let mut block = Block::new(
        height,
        tip.header_hash(),
        now_ms(),
        0,
        chain.config.bits,
        transactions,
    );
    solve(&mut block);
    block
}

/// A chain with one matured coinbase output: mints to a fresh key at height
/// 1, then adds filler blocks until the coinbase is spendable. Returns the
/// chain, the funded key and the coinbase txid.
pub fn funded_chain() -> (Blockchain, KeyPair, String) {
    let mut chain = test_chain();
    let owner = KeyPair::generate();

    let mint = next_block(&chain, vec![], &owner.address());
    let coinbase_id = mint.transactions[0].id.clone();
    chain.connect_block(&mint).expect("mint connects");

    for _ in 0..test_config().coinbase_maturity {
        let filler = next_block(&chain, vec![], "filler");
        chain.connect_block(&filler).expect("filler connects");
    }

    (chain, owner, coinbase_id)
}

/// A single-input spend of `txid:index`, signed by `key`
pub fn spend(key: &KeyPair, txid: &str, index: u32, outputs: Vec<(String, u64)>) -> Transaction {
    let inputs = vec![TxInput {
        txid: txid.to_string(),
        index,
        pub_key: String::new(),
        sig: String::new(),
    }];
    let outputs = outputs
        .into_iter()
        .map(|(address, amount)| TxOutput { address, amount })
        .collect();

    let mut tx = Transaction::new(inputs, outputs);
    tx.sign_inputs(key).expect("signing succeeds");
    tx
}
