//! Shared node state and the submission critical section
//!
//! Chain, UTXO set, mempool, seen-sets and the store live behind one lock.
//! Every mutation (validate, apply, persist) runs as a single write-lock
//! turn, so no reader ever observes a partial update and the gossip and
//! ingress layers never hold mutation handles of their own.

use std::collections::HashSet;

use tokio::sync::RwLock;

use crate::config::ConsensusConfig;
use crate::core::block::Block;
use crate::core::blockchain::{BlockError, Blockchain};
use crate::core::transaction::{Outpoint, Transaction};
use crate::core::utxo::{UtxoEntry, UtxoSet};
use crate::mining::candidate::{build_candidate, CandidateError};
use crate::mining::mempool::{Mempool, MempoolError};
use crate::storage::blockstore::{BlockStore, StoreError};

/// The node: process-global state behind a single lock
pub struct Node {
    inner: RwLock<NodeInner>,
}

struct NodeInner {
    chain: Blockchain,
    mempool: Mempool,
    seen_txs: HashSet<String>,
    seen_blocks: HashSet<String>,
    store: BlockStore,
}

impl Node {
    /// Load the chain from the store, or create and persist the genesis
    /// block on first start. Any corruption here is fatal.
    pub fn open(store: BlockStore) -> Result<Self, StoreError> {
        let config = store.load_or_init_config()?;
        let mut chain = Blockchain::new(config);

        let blocks = store.load_blocks()?;
        if blocks.is_empty() {
            let genesis = Block::genesis(chain.config.bits);
            store.append_block(&genesis)?;
            log::info!("created genesis block {}", genesis.header_hash());
            chain
                .replay_block(genesis)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        } else {
            let count = blocks.len();
            for block in blocks {
                chain
                    .replay_block(block)
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            }
            log::info!(
                "loaded {count} blocks, tip {}",
                chain.tip().map(|b| b.header_hash()).unwrap_or_default()
            );
        }

        Ok(Self {
            inner: RwLock::new(NodeInner {
                chain,
                mempool: Mempool::new(),
                seen_txs: HashSet::new(),
                seen_blocks: HashSet::new(),
                store,
            }),
        })
    }

    /// Validate a transaction and admit it to the mempool.
    ///
    /// Returns the assigned id; re-submitting a pooled transaction is an
    /// idempotent success.
    pub async fn submit_transaction(&self, tx: Transaction) -> Result<String, MempoolError> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let id = inner.mempool.admit(tx, &inner.chain)?;
        inner.seen_txs.insert(id.clone());
        log::debug!("admitted tx {id} to mempool");
        Ok(id)
    }

    /// Validate a block against the tip and commit it: UTXO advances, the
    /// block is persisted, the retargeter runs, and mined or conflicting
    /// mempool entries are evicted, all in one turn.
    ///
    /// Re-submitting the current tip is an idempotent success.
    pub async fn submit_block(&self, block: Block) -> Result<u64, BlockError> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let hash = block.header_hash();
        if let Some(tip) = inner.chain.tip() {
            if tip.header_hash() == hash {
                return Ok(tip.index);
            }
        }

        let height = inner.chain.connect_block(&block)?;

        // Persistence failures are transient: the accepted block stays live
        // and the same height is rewritten on the next restart-from-peer.
        if let Err(e) = inner.store.append_block(&block) {
            log::error!("failed to persist block {height}: {e}");
        }
        if inner.chain.maybe_retarget().is_some() {
            if let Err(e) = inner.store.save_config(&inner.chain.config) {
                log::error!("failed to persist retargeted config: {e}");
            }
        }

        inner.mempool.remove_mined(&block);
        inner.mempool.drop_conflicting(&inner.chain.utxo);
        inner.seen_blocks.insert(hash);

        log::info!(
            "accepted block {height} with {} transactions",
            block.transactions.len()
        );
        Ok(height)
    }

    /// Assemble an unsolved block candidate for an external miner
    pub async fn build_candidate(&self, miner_address: &str) -> Result<Block, CandidateError> {
        let guard = self.inner.read().await;
        build_candidate(&guard.chain, &guard.mempool, miner_address)
    }

    /// Record a gossiped tx id; returns true on first sight
    pub async fn mark_tx_seen(&self, id: &str) -> bool {
        self.inner.write().await.seen_txs.insert(id.to_string())
    }

    /// Record a gossiped block hash; returns true on first sight
    pub async fn mark_block_seen(&self, hash: &str) -> bool {
        self.inner.write().await.seen_blocks.insert(hash.to_string())
    }

    pub async fn consensus_config(&self) -> ConsensusConfig {
        self.inner.read().await.chain.config.clone()
    }

    /// The whole chain, height-ordered
    pub async fn chain_snapshot(&self) -> Vec<Block> {
        self.inner.read().await.chain.blocks().to_vec()
    }

    pub async fn block_count(&self) -> u64 {
        self.inner.read().await.chain.block_count()
    }

    pub async fn tip(&self) -> Option<Block> {
        self.inner.read().await.chain.tip().cloned()
    }

    pub async fn block_at(&self, height: u64) -> Option<Block> {
        self.inner.read().await.chain.block_at(height).cloned()
    }

    /// Pending transactions in admission order
    pub async fn mempool_snapshot(&self) -> Vec<Transaction> {
        self.inner
            .read()
            .await
            .mempool
            .ordered()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Spendable outputs for an address
    pub async fn utxos_for_address(&self, address: &str) -> Vec<(Outpoint, UtxoEntry)> {
        self.inner.read().await.chain.utxo.for_address(address)
    }

    pub async fn utxo_snapshot(&self) -> UtxoSet {
        self.inner.read().await.chain.utxo.clone()
    }

    /// Find a transaction on the chain (with its block height) or in the
    /// mempool (height `None`)
    pub async fn find_transaction(&self, id: &str) -> Option<(Transaction, Option<u64>)> {
        let guard = self.inner.read().await;
        if let Some((tx, height)) = guard.chain.find_tx(id) {
            return Some((tx.clone(), Some(height)));
        }
        guard.mempool.get(id).map(|tx| (tx.clone(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::{GENESIS_ADDRESS, GENESIS_PREV_HASH};
    use crate::testutil::{solve, spend, test_config};

    fn open_node(dir: &std::path::Path) -> Node {
        let store = BlockStore::open(dir).unwrap();
        store.save_config(&test_config()).unwrap();
        Node::open(store).unwrap()
    }

    /// Mine `count` blocks through the candidate path
    async fn mine(node: &Node, miner: &str, count: usize) {
        for _ in 0..count {
            let mut block = node.build_candidate(miner).await.unwrap();
            solve(&mut block);
            node.submit_block(block).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_fresh_node_has_genesis_only() {
        let dir = tempfile::tempdir().unwrap();
        let node = open_node(dir.path());

        let chain = node.chain_snapshot().await;
        assert_eq!(chain.len(), 1);

        let genesis = &chain[0];
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, GENESIS_PREV_HASH);
        assert_eq!(genesis.bits, test_config().bits);
        assert_eq!(genesis.transactions.len(), 1);
        assert_eq!(genesis.transactions[0].outputs[0].address, GENESIS_ADDRESS);
        assert_eq!(genesis.transactions[0].outputs[0].amount, 0);
    }

    #[tokio::test]
    async fn test_restart_replays_identical_state() {
        let dir = tempfile::tempdir().unwrap();
        let (chain_before, utxo_before) = {
            let node = open_node(dir.path());
            mine(&node, "miner", 4).await;
            (node.chain_snapshot().await, node.utxo_snapshot().await)
        };

        let node = open_node(dir.path());
        assert_eq!(node.chain_snapshot().await, chain_before);
        assert_eq!(node.utxo_snapshot().await, utxo_before);
    }

    #[tokio::test]
    async fn test_restart_does_not_recreate_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let first = {
            let node = open_node(dir.path());
            node.tip().await.unwrap()
        };
        let second = open_node(dir.path()).tip().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_submit_spend_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let node = open_node(dir.path());
        let owner = crate::crypto::KeyPair::generate();

        // Mint to owner, then mature the coinbase
        mine(&node, &owner.address(), 1).await;
        let coinbase_id = node.block_at(1).await.unwrap().transactions[0].id.clone();
        mine(&node, "filler", test_config().coinbase_maturity as usize).await;

        let tx = spend(
            &owner,
            &coinbase_id,
            0,
            vec![("bb".repeat(20), 30), (owner.address(), 18)],
        );
        let id = node.submit_transaction(tx.clone()).await.unwrap();

        assert_eq!(id, tx.compute_id());
        let pool = node.mempool_snapshot().await;
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].id, id);

        // Mine it; the pool drains and both outputs appear in the UTXO
        mine(&node, "miner", 1).await;
        assert!(node.mempool_snapshot().await.is_empty());
        let (found, height) = node.find_transaction(&id).await.unwrap();
        assert_eq!(found.id, id);
        assert!(height.is_some());

        let utxos = node.utxos_for_address(&"bb".repeat(20)).await;
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].1.amount, 30);
    }

    #[tokio::test]
    async fn test_mempool_double_spend_over_node() {
        let dir = tempfile::tempdir().unwrap();
        let node = open_node(dir.path());
        let owner = crate::crypto::KeyPair::generate();

        mine(&node, &owner.address(), 1).await;
        let coinbase_id = node.block_at(1).await.unwrap().transactions[0].id.clone();
        mine(&node, "filler", test_config().coinbase_maturity as usize).await;

        let first = spend(&owner, &coinbase_id, 0, vec![("aa".repeat(20), 50)]);
        let second = spend(&owner, &coinbase_id, 0, vec![("bb".repeat(20), 50)]);

        node.submit_transaction(first).await.unwrap();
        let err = node.submit_transaction(second).await.unwrap_err();
        assert_eq!(err.to_string(), "mempool double spend");
    }

    #[tokio::test]
    async fn test_duplicate_block_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let node = open_node(dir.path());

        let mut block = node.build_candidate("miner").await.unwrap();
        solve(&mut block);
        let height = node.submit_block(block.clone()).await.unwrap();
        let again = node.submit_block(block).await.unwrap();
        assert_eq!(height, again);
        assert_eq!(node.block_count().await, 2);
    }

    #[tokio::test]
    async fn test_seen_sets_short_circuit() {
        let dir = tempfile::tempdir().unwrap();
        let node = open_node(dir.path());

        assert!(node.mark_tx_seen("some-id").await);
        assert!(!node.mark_tx_seen("some-id").await);
        assert!(node.mark_block_seen("some-hash").await);
        assert!(!node.mark_block_seen("some-hash").await);
    }

    #[tokio::test]
    async fn test_submitted_tx_is_preseen_for_gossip() {
        let dir = tempfile::tempdir().unwrap();
        let node = open_node(dir.path());
        let owner = crate::crypto::KeyPair::generate();

        mine(&node, &owner.address(), 1).await;
        let coinbase_id = node.block_at(1).await.unwrap().transactions[0].id.clone();
        mine(&node, "filler", test_config().coinbase_maturity as usize).await;

        let tx = spend(&owner, &coinbase_id, 0, vec![("aa".repeat(20), 50)]);
        let id = node.submit_transaction(tx).await.unwrap();

        // A peer echoing the tx back is a no-op by seen-set
        assert!(!node.mark_tx_seen(&id).await);
    }

    #[tokio::test]
    async fn test_block_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let node = open_node(dir.path());
        assert!(node.block_at(7).await.is_none());
        assert!(node.find_transaction("missing").await.is_none());
    }
}
