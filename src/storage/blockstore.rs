//! On-disk chain store
//!
//! One canonical-JSON file per block under `blocks/`, named by height, plus
//! the consensus config at `config.json`. Loading orders blocks by integer
//! height, never by filename string order. Config writes go through a temp
//! file and rename so a crash never leaves a torn config behind.

use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ConsensusConfig;
use crate::core::block::Block;

/// Storage failures. Errors raised while loading at startup are fatal; write
/// errors after startup are logged and absorbed by the caller.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt block store: {0}")]
    Corrupt(String),
}

/// Handle on the data directory
pub struct BlockStore {
    data_dir: PathBuf,
}

impl BlockStore {
    /// Open (creating if needed) the data directory and its `blocks/` subdir
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir.join("blocks"))?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
        })
    }

    fn block_path(&self, height: u64) -> PathBuf {
        self.data_dir.join("blocks").join(format!("{height}.json"))
    }

    fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    /// Persist one block under its height. Rewriting the same height is
    /// overwrite-safe.
    pub fn append_block(&self, block: &Block) -> Result<(), StoreError> {
        let file = fs::File::create(self.block_path(block.index))?;
        serde_json::to_writer(BufWriter::new(file), block)?;
        Ok(())
    }

    /// Load every stored block in height order.
    ///
    /// Heights must be contiguous from zero; a gap or an unparsable file is
    /// a corrupt store, which is fatal at startup.
    pub fn load_blocks(&self) -> Result<Vec<Block>, StoreError> {
        let mut heights: Vec<u64> = Vec::new();
        for entry in fs::read_dir(self.data_dir.join("blocks"))? {
            let path = entry?.path();
            let stem = path.file_stem().and_then(|s| s.to_str());
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match stem.and_then(|s| s.parse::<u64>().ok()) {
                Some(height) => heights.push(height),
                None => {
                    return Err(StoreError::Corrupt(format!(
                        "unexpected file in block directory: {}",
                        path.display()
                    )))
                }
            }
        }
        heights.sort_unstable();

        let mut blocks = Vec::with_capacity(heights.len());
        for (position, height) in heights.iter().enumerate() {
            if *height != position as u64 {
                return Err(StoreError::Corrupt(format!(
                    "missing block file for height {position}"
                )));
            }
            let file = fs::File::open(self.block_path(*height))?;
            let block: Block = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                StoreError::Corrupt(format!("block file {height}.json: {e}"))
            })?;
            if block.index != *height {
                return Err(StoreError::Corrupt(format!(
                    "block file {height}.json holds height {}",
                    block.index
                )));
            }
            blocks.push(block);
        }
        Ok(blocks)
    }

    /// Load the consensus config, writing the defaults on first start
    pub fn load_or_init_config(&self) -> Result<ConsensusConfig, StoreError> {
        let path = self.config_path();
        if path.exists() {
            let file = fs::File::open(&path)?;
            let config = serde_json::from_reader(BufReader::new(file))
                .map_err(|e| StoreError::Corrupt(format!("config.json: {e}")))?;
            Ok(config)
        } else {
            let config = ConsensusConfig::default();
            self.save_config(&config)?;
            Ok(config)
        }
    }

    /// Persist the consensus config atomically (temp file + rename)
    pub fn save_config(&self, config: &ConsensusConfig) -> Result<(), StoreError> {
        let temp = self.data_dir.join("config.json.tmp");
        let file = fs::File::create(&temp)?;
        serde_json::to_writer_pretty(BufWriter::new(file), config)?;
        fs::rename(&temp, self.config_path())?;
        Ok(())
    }
}
