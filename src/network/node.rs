//! Gossip node: deduplicated flood of transactions and blocks
//!
//! Listens for inbound peers, dials the configured seeds with a fixed-delay
//! reconnect loop, and dispatches peer messages: first sight of a valid
//! announcement is validated, applied, and re-broadcast to every other peer;
//! repeats short-circuit on the seen-sets; invalid messages are dropped with
//! a warning and the peer stays connected.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::network::message::Message;
use crate::network::peer::PeerManager;
use crate::network::server::{connect_to_peer, handle_connection, Server};
use crate::node::Node;

/// Delay between redials of a lost outbound peer
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Gossip layer configuration
#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// Port to listen on for inbound peers
    pub port: u16,
    /// Seed peers to dial, as `host:port`
    pub peers: Vec<String>,
}

/// The gossip node, wired to the shared node state
pub struct GossipNode {
    config: GossipConfig,
    node: Arc<Node>,
    peer_manager: Arc<PeerManager>,
}

impl GossipNode {
    pub fn new(config: GossipConfig, node: Arc<Node>) -> Self {
        Self {
            config,
            node,
            peer_manager: Arc::new(PeerManager::new()),
        }
    }

    /// The peer registry, shared with the ingress layer so accepted
    /// submissions fan out to the mesh
    pub fn peer_manager(&self) -> Arc<PeerManager> {
        self.peer_manager.clone()
    }

    /// Bind the listener, dial the seeds, and run the dispatch loop
    pub async fn start(&self) -> Result<(), std::io::Error> {
        let server = Server::bind(self.config.port).await?;
        let (message_tx, mut message_rx) = mpsc::channel::<(SocketAddr, Message)>(1024);

        let accept_pm = self.peer_manager.clone();
        let accept_tx = message_tx.clone();
        tokio::spawn(async move {
            loop {
                match server.accept().await {
                    Ok((stream, addr)) => {
                        let pm = accept_pm.clone();
                        let tx = accept_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, addr, pm, None, tx, false).await
                            {
                                log::warn!("connection error with {addr}: {e}");
                            }
                        });
                    }
                    Err(e) => log::error!("accept error: {e}"),
                }
            }
        });

        for url in &self.config.peers {
            self.connect_to(url, message_tx.clone()).await;
        }

        while let Some((from, msg)) = message_rx.recv().await {
            self.handle_message(from, msg).await;
        }
        Ok(())
    }

    /// Start a reconnect loop for one seed URL. Dialing a URL that already
    /// has a loop is a no-op, so there is never a duplicate connection to
    /// the same peer.
    pub async fn connect_to(&self, url: &str, message_tx: mpsc::Sender<(SocketAddr, Message)>) {
        if !self.peer_manager.claim_outbound(url).await {
            log::debug!("outbound loop for {url} already running");
            return;
        }

        let url = url.to_string();
        let peer_manager = self.peer_manager.clone();
        tokio::spawn(async move {
            loop {
                match connect_to_peer(&url).await {
                    Ok((stream, addr)) => {
                        log::info!("connected to peer {url}");
                        if let Err(e) = handle_connection(
                            stream,
                            addr,
                            peer_manager.clone(),
                            Some(Message::GetTip),
                            message_tx.clone(),
                            true,
                        )
                        .await
                        {
                            log::warn!("connection error with {url}: {e}");
                        }
                    }
                    Err(e) => log::debug!("dial {url} failed: {e}"),
                }
                sleep(RECONNECT_DELAY).await;
            }
        });
    }

    /// Dispatch one peer message
    async fn handle_message(&self, from: SocketAddr, msg: Message) {
        log::debug!("received {} from {from}", msg.type_name());

        match msg {
            Message::Tx { tx } => {
                let id = tx.compute_id();
                if !self.node.mark_tx_seen(&id).await {
                    return;
                }
                match self.node.submit_transaction(tx.clone()).await {
                    Ok(id) => {
                        log::debug!("relaying tx {id}");
                        self.peer_manager
                            .broadcast_except(Message::Tx { tx }, &from)
                            .await;
                    }
                    Err(e) => log::warn!("dropping invalid tx from {from}: {e}"),
                }
            }

            Message::Block { block } => {
                let hash = block.header_hash();
                if !self.node.mark_block_seen(&hash).await {
                    return;
                }
                match self.node.submit_block(block.clone()).await {
                    Ok(height) => {
                        log::info!("accepted gossiped block at height {height}");
                        self.peer_manager
                            .broadcast_except(Message::Block { block }, &from)
                            .await;
                    }
                    Err(e) => log::warn!("dropping invalid block from {from}: {e}"),
                }
            }

            Message::GetTip => {
                let tip = self.node.tip().await;
                if let Err(e) = self.peer_manager.send_to(&from, Message::Tip { tip }).await {
                    log::warn!("failed to send tip to {from}: {e}");
                }
            }

            Message::Tip { tip } => {
                // Fork detection only; this node never switches tips
                if let Some(tip) = tip {
                    match self.node.tip().await {
                        Some(ours) if ours.header_hash() == tip.header_hash() => {}
                        Some(ours) if ours.index == tip.index => log::warn!(
                            "peer {from} holds a competing tip at height {}",
                            tip.index
                        ),
                        _ => log::info!("peer {from} reports tip at height {}", tip.index),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BlockStore;
    use crate::testutil::{solve, spend, test_config};

    fn fake_addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    async fn gossip_node(dir: &std::path::Path) -> GossipNode {
        let store = BlockStore::open(dir).unwrap();
        store.save_config(&test_config()).unwrap();
        let node = Arc::new(Node::open(store).unwrap());
        GossipNode::new(
            GossipConfig {
                port: 0,
                peers: vec![],
            },
            node,
        )
    }

    /// Mine blocks through the shared node until a coinbase owned by `key`
    /// is spendable; returns the coinbase txid
    async fn fund(node: &Arc<Node>, key: &crate::crypto::KeyPair) -> String {
        for miner in std::iter::once(key.address())
            .chain((0..test_config().coinbase_maturity).map(|_| "filler".to_string()))
        {
            let mut block = node.build_candidate(&miner).await.unwrap();
            solve(&mut block);
            node.submit_block(block).await.unwrap();
        }
        node.block_at(1).await.unwrap().transactions[0].id.clone()
    }

    #[tokio::test]
    async fn test_duplicate_tx_gossip_is_single_admission() {
        let dir = tempfile::tempdir().unwrap();
        let gossip = gossip_node(dir.path()).await;
        let owner = crate::crypto::KeyPair::generate();
        let coinbase_id = fund(&gossip.node, &owner).await;

        let tx = spend(&owner, &coinbase_id, 0, vec![("aa".repeat(20), 50)]);

        // Two peers relay the same transaction
        gossip
            .handle_message(fake_addr(9001), Message::Tx { tx: tx.clone() })
            .await;
        gossip
            .handle_message(fake_addr(9002), Message::Tx { tx: tx.clone() })
            .await;

        let pool = gossip.node.mempool_snapshot().await;
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].id, tx.compute_id());
    }

    #[tokio::test]
    async fn test_duplicate_block_gossip_is_single_connect() {
        let dir = tempfile::tempdir().unwrap();
        let gossip = gossip_node(dir.path()).await;

        let mut block = gossip.node.build_candidate("miner").await.unwrap();
        solve(&mut block);

        gossip
            .handle_message(fake_addr(9001), Message::Block { block: block.clone() })
            .await;
        gossip
            .handle_message(fake_addr(9002), Message::Block { block })
            .await;

        assert_eq!(gossip.node.block_count().await, 2);
    }

    #[tokio::test]
    async fn test_invalid_gossip_is_dropped_without_state_change() {
        let dir = tempfile::tempdir().unwrap();
        let gossip = gossip_node(dir.path()).await;
        let owner = crate::crypto::KeyPair::generate();

        // Spends a UTXO that does not exist
        let tx = spend(&owner, &"ab".repeat(32), 0, vec![("aa".repeat(20), 5)]);
        gossip
            .handle_message(fake_addr(9001), Message::Tx { tx })
            .await;

        assert!(gossip.node.mempool_snapshot().await.is_empty());
        assert_eq!(gossip.node.block_count().await, 1);
    }

    #[tokio::test]
    async fn test_get_tip_without_peer_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let gossip = gossip_node(dir.path()).await;
        // The reply send fails (no registered handle) and is only logged
        gossip.handle_message(fake_addr(9001), Message::GetTip).await;
        gossip
            .handle_message(
                fake_addr(9001),
                Message::Tip {
                    tip: gossip.node.tip().await,
                },
            )
            .await;
    }
}
