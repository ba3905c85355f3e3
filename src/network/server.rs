//! Peer transport: message framing and connection handling
//!
//! Messages travel as length-prefixed JSON frames over TCP: 4 magic bytes,
//! a big-endian u32 payload length, then the serde_json body. Each
//! connection splits into a writer task fed by a channel and a read loop
//! forwarding decoded messages to the gossip dispatcher.

use bytes::{Buf, BufMut, BytesMut};
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder, Framed};

use crate::network::message::Message;
use crate::network::peer::{PeerError, PeerHandle, PeerManager};

/// Frame magic, "TINC"
pub const MAGIC: [u8; 4] = [0x54, 0x49, 0x4E, 0x43];

/// Length-prefixed JSON message codec
pub struct MessageCodec;

impl Encoder<Message> for MessageCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let data = item
            .to_bytes()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        dst.reserve(8 + data.len());
        dst.put_slice(&MAGIC);
        dst.put_u32(data.len() as u32);
        dst.put_slice(&data);
        Ok(())
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 8 {
            return Ok(None);
        }

        if src[..4] != MAGIC {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "invalid magic bytes",
            ));
        }

        let len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;
        if src.len() < 8 + len {
            return Ok(None);
        }

        src.advance(8);
        let data = src.split_to(len);

        let msg = Message::from_bytes(&data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        Ok(Some(msg))
    }
}

/// TCP listener for inbound peers
pub struct Server {
    listener: TcpListener,
}

impl Server {
    pub async fn bind(port: u16) -> Result<Self, std::io::Error> {
        let addr = format!("0.0.0.0:{port}");
        let listener = TcpListener::bind(&addr).await?;
        log::info!("peer protocol listening on {addr}");
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), std::io::Error> {
        self.listener.accept().await
    }
}

/// Dial a peer by `host:port`
pub async fn connect_to_peer(url: &str) -> Result<(TcpStream, SocketAddr), PeerError> {
    let stream = TcpStream::connect(url)
        .await
        .map_err(|e| PeerError::ConnectionFailed(e.to_string()))?;
    let peer_addr = stream
        .peer_addr()
        .map_err(|e| PeerError::ConnectionFailed(e.to_string()))?;
    Ok((stream, peer_addr))
}

/// Drive one peer connection until it closes.
///
/// Registers the peer, optionally sends a greeting, then pumps inbound
/// frames into `message_tx` while a writer task drains the peer's send
/// channel. Returns once either side drops.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    peer_manager: Arc<PeerManager>,
    greeting: Option<Message>,
    message_tx: mpsc::Sender<(SocketAddr, Message)>,
    outbound: bool,
) -> Result<(), PeerError> {
    let framed = Framed::new(stream, MessageCodec);
    let (mut writer, mut reader) = framed.split();

    let (tx, mut rx) = mpsc::channel::<Message>(128);
    peer_manager
        .add_peer(addr, PeerHandle { addr, tx }, outbound)
        .await;

    if let Some(msg) = greeting {
        writer.send(msg).await.map_err(PeerError::Io)?;
    }

    let write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if writer.send(msg).await.is_err() {
                break;
            }
        }
    });

    loop {
        match reader.next().await {
            Some(Ok(msg)) => {
                if message_tx.send((addr, msg)).await.is_err() {
                    break;
                }
            }
            Some(Err(e)) => {
                log::warn!("error reading from {addr}: {e}");
                break;
            }
            None => {
                log::debug!("peer {addr} closed the connection");
                break;
            }
        }
    }

    write_task.abort();
    peer_manager.remove_peer(&addr).await;
    Ok(())
}
