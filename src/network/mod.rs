//! Peer gossip: messages, framing, peer registry and the gossip node

pub mod message;
pub mod node;
pub mod peer;
pub mod server;

pub use message::Message;
pub use node::{GossipConfig, GossipNode, RECONNECT_DELAY};
pub use peer::{PeerError, PeerHandle, PeerManager};
pub use server::{connect_to_peer, handle_connection, Server};
