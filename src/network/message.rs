//! Peer protocol messages
//!
//! JSON messages tagged by a `type` field: transaction and block
//! announcements plus the tip exchange. Tip responses are informational;
//! this node detects diverging tips but never reorganizes onto them.

use serde::{Deserialize, Serialize};

use crate::core::block::Block;
use crate::core::transaction::Transaction;

/// A peer-protocol message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Transaction announcement
    Tx { tx: Transaction },
    /// Block announcement
    Block { block: Block },
    /// Ask a peer for its tip
    GetTip,
    /// Tip response; `None` for an empty chain
    Tip { tip: Option<Block> },
}

impl Message {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Message type name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Tx { .. } => "tx",
            Message::Block { .. } => "block",
            Message::GetTip => "get_tip",
            Message::Tip { .. } => "tip",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_format_on_the_wire() {
        let json = serde_json::to_value(Message::GetTip).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "get_tip" }));

        let tip = serde_json::to_value(Message::Tip { tip: None }).unwrap();
        assert_eq!(tip, serde_json::json!({ "type": "tip", "tip": null }));
    }

    #[test]
    fn test_tx_message_round_trip() {
        let msg = Message::Tx {
            tx: Transaction::coinbase("miner", 50),
        };
        let bytes = msg.to_bytes().unwrap();

        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["type"], "tx");
        assert!(json.get("tx").is_some());

        match Message::from_bytes(&bytes).unwrap() {
            Message::Tx { tx } => assert_eq!(tx.outputs[0].amount, 50),
            other => panic!("decoded wrong variant: {}", other.type_name()),
        }
    }

    #[test]
    fn test_block_message_round_trip() {
        let msg = Message::Block {
            block: Block::genesis(0x1f00_ffff),
        };
        let decoded = Message::from_bytes(&msg.to_bytes().unwrap()).unwrap();
        match decoded {
            Message::Block { block } => assert_eq!(block.index, 0),
            other => panic!("decoded wrong variant: {}", other.type_name()),
        }
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        assert!(Message::from_bytes(br#"{"type":"get_blocks"}"#).is_err());
        assert!(Message::from_bytes(b"not json").is_err());
    }
}
