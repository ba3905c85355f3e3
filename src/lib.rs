//! Tincoin: a miniature Bitcoin-style full node
//!
//! This crate implements the consensus core of a small proof-of-work chain
//! for local testbed networks:
//! - an append-only chain of blocks linked by header hash
//! - a rebuildable UTXO set representing spendable value
//! - a mempool with outpoint reservation against double spends
//! - compact-target proof-of-work arithmetic and periodic retargeting
//! - block-candidate assembly for external mining workers
//! - a gossip mesh flooding transactions and blocks between peers
//! - an HTTP ingress API for wallets, miners and explorers
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tincoin::node::Node;
//! use tincoin::storage::BlockStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = BlockStore::open(Path::new(".tincoin_data"))?;
//! let node = Node::open(store)?;
//!
//! let candidate = node.build_candidate("aabbccddeeff00112233445566778899aabbccdd").await?;
//! println!("mining template at height {}", candidate.index);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod core;
pub mod crypto;
pub mod mining;
pub mod network;
pub mod node;
pub mod storage;

#[cfg(test)]
pub mod testutil;

// Re-export commonly used types
pub use crate::api::{create_router, ApiState};
pub use crate::config::{ConsensusConfig, ProcessConfig};
pub use crate::core::{Block, Blockchain, Transaction};
pub use crate::crypto::KeyPair;
pub use crate::mining::Mempool;
pub use crate::network::{GossipConfig, GossipNode, PeerManager};
pub use crate::node::Node;
pub use crate::storage::BlockStore;
