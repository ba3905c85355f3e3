//! Mempool and block-candidate assembly

pub mod candidate;
pub mod mempool;

pub use candidate::{build_candidate, CandidateError};
pub use mempool::{Mempool, MempoolError};
