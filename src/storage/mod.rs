//! Persistence: the per-block chain store and config file

pub mod blockstore;

pub use blockstore::{BlockStore, StoreError};
