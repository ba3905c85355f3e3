//! Node configuration
//!
//! Two layers: the consensus parameters, persisted as one JSON file alongside
//! the block directory, and the per-process settings read from the
//! environment (listen ports, seed peers, data directory).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default HTTP ingress port
pub const DEFAULT_HTTP_PORT: u16 = 3000;

/// Default peer-protocol port
pub const DEFAULT_P2P_PORT: u16 = 6001;

/// Default data directory
pub const DEFAULT_DATA_DIR: &str = ".tincoin_data";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {var}: {reason}")]
    InvalidEnv { var: String, reason: String },
}

/// Consensus parameters, persisted as `config.json` in the data directory.
///
/// `bits` is live state: the retargeter rewrites it as difficulty adjusts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusConfig {
    /// Retarget every this many blocks
    pub adjust_every: u64,
    /// Desired seconds between blocks
    pub target_block_time_sec: u64,
    /// Coinbase reward before halvings
    pub block_subsidy: u64,
    /// Blocks between subsidy halvings
    pub halving_interval: u64,
    /// Confirmations before a coinbase output may be spent
    pub coinbase_maturity: u64,
    /// Mempool entries admitted per block candidate
    pub max_block_tx: usize,
    /// Current compact target
    pub bits: u32,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            adjust_every: 10,
            target_block_time_sec: 10,
            block_subsidy: 50,
            halving_interval: 1000,
            coinbase_maturity: 6,
            max_block_tx: 100,
            bits: 0x1f00_ffff,
        }
    }
}

/// Per-process settings from the environment
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// HTTP ingress listen port (`TINCOIN_HTTP_PORT`)
    pub http_port: u16,
    /// Peer-protocol listen port (`TINCOIN_P2P_PORT`)
    pub p2p_port: u16,
    /// Seed peers to dial, `host:port` (`TINCOIN_PEERS`, JSON array)
    pub peers: Vec<String>,
    /// Data directory for blocks and config (`TINCOIN_DATA_DIR`)
    pub data_dir: PathBuf,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            p2p_port: DEFAULT_P2P_PORT,
            peers: Vec::new(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl ProcessConfig {
    /// Read the process configuration from the environment, falling back to
    /// defaults for unset variables. Malformed values are startup failures.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("TINCOIN_HTTP_PORT") {
            config.http_port = parse_port("TINCOIN_HTTP_PORT", &raw)?;
        }
        if let Ok(raw) = std::env::var("TINCOIN_P2P_PORT") {
            config.p2p_port = parse_port("TINCOIN_P2P_PORT", &raw)?;
        }
        if let Ok(raw) = std::env::var("TINCOIN_PEERS") {
            config.peers =
                serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidEnv {
                    var: "TINCOIN_PEERS".to_string(),
                    reason: format!("expected a JSON array of \"host:port\" strings: {e}"),
                })?;
        }
        if let Ok(raw) = std::env::var("TINCOIN_DATA_DIR") {
            config.data_dir = PathBuf::from(raw);
        }

        Ok(config)
    }
}

fn parse_port(var: &str, raw: &str) -> Result<u16, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        reason: format!("not a port number: {raw:?}"),
    })
}
