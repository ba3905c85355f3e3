//! Peer registry
//!
//! Tracks live connections as message senders and the set of outbound URLs
//! that already own a reconnect loop, so dialing the same seed twice never
//! produces a duplicate connection.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

use crate::network::message::Message;

/// Peer connection errors
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("peer disconnected")]
    Disconnected,
}

/// Handle for sending messages to one connected peer
#[derive(Clone)]
pub struct PeerHandle {
    pub addr: SocketAddr,
    pub tx: mpsc::Sender<Message>,
}

impl PeerHandle {
    pub async fn send(&self, msg: Message) -> Result<(), PeerError> {
        self.tx.send(msg).await.map_err(|_| PeerError::Disconnected)
    }
}

/// All live peer connections plus the outbound dial registry
#[derive(Default)]
pub struct PeerManager {
    handles: RwLock<HashMap<SocketAddr, PeerHandle>>,
    /// Outbound URLs that already have a reconnect loop running
    outbound: RwLock<HashSet<String>>,
}

impl PeerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connected peer
    pub async fn add_peer(&self, addr: SocketAddr, handle: PeerHandle, outbound: bool) {
        self.handles.write().await.insert(addr, handle);
        log::info!("peer connected: {addr} (outbound: {outbound})");
    }

    /// Drop a disconnected peer
    pub async fn remove_peer(&self, addr: &SocketAddr) {
        if self.handles.write().await.remove(addr).is_some() {
            log::info!("peer disconnected: {addr}");
        }
    }

    /// Claim a seed URL for dialing. Returns false when a reconnect loop for
    /// this URL already exists, making repeated dials idempotent.
    pub async fn claim_outbound(&self, url: &str) -> bool {
        self.outbound.write().await.insert(url.to_string())
    }

    pub async fn peer_count(&self) -> usize {
        self.handles.read().await.len()
    }

    /// Send to one peer
    pub async fn send_to(&self, addr: &SocketAddr, msg: Message) -> Result<(), PeerError> {
        let handles = self.handles.read().await;
        match handles.get(addr) {
            Some(handle) => handle.send(msg).await,
            None => Err(PeerError::Disconnected),
        }
    }

    /// Fan a message out to every connected peer
    pub async fn broadcast(&self, msg: Message) {
        let handles = self.handles.read().await;
        for (addr, handle) in handles.iter() {
            if let Err(e) = handle.send(msg.clone()).await {
                log::warn!("failed to send {} to {addr}: {e}", msg.type_name());
            }
        }
    }

    /// Fan a message out to every peer except the one it came from
    pub async fn broadcast_except(&self, msg: Message, except: &SocketAddr) {
        let handles = self.handles.read().await;
        for (addr, handle) in handles.iter() {
            if addr == except {
                continue;
            }
            if let Err(e) = handle.send(msg.clone()).await {
                log::warn!("failed to send {} to {addr}: {e}", msg.type_name());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[tokio::test]
    async fn test_add_remove_peer() {
        let manager = PeerManager::new();
        let (tx, _rx) = mpsc::channel(4);
        manager
            .add_peer(addr(9001), PeerHandle { addr: addr(9001), tx }, false)
            .await;
        assert_eq!(manager.peer_count().await, 1);

        manager.remove_peer(&addr(9001)).await;
        assert_eq!(manager.peer_count().await, 0);
    }

    #[tokio::test]
    async fn test_claim_outbound_is_idempotent() {
        let manager = PeerManager::new();
        assert!(manager.claim_outbound("127.0.0.1:6001").await);
        assert!(!manager.claim_outbound("127.0.0.1:6001").await);
        assert!(manager.claim_outbound("127.0.0.1:6002").await);
    }

    #[tokio::test]
    async fn test_broadcast_except_skips_origin() {
        let manager = PeerManager::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        manager
            .add_peer(addr(9001), PeerHandle { addr: addr(9001), tx: tx_a }, false)
            .await;
        manager
            .add_peer(addr(9002), PeerHandle { addr: addr(9002), tx: tx_b }, false)
            .await;

        manager
            .broadcast_except(Message::GetTip, &addr(9001))
            .await;

        assert!(rx_b.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer_fails() {
        let manager = PeerManager::new();
        assert!(manager.send_to(&addr(9999), Message::GetTip).await.is_err());
    }
}
