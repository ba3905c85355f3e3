//! Tincoin node daemon
//!
//! Boots the chain from the data directory (creating the genesis block on
//! first start), serves the HTTP ingress API, and joins the gossip mesh.
//! Configuration comes from the environment (`TINCOIN_HTTP_PORT`,
//! `TINCOIN_P2P_PORT`, `TINCOIN_PEERS`, `TINCOIN_DATA_DIR`); command-line
//! flags override it.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use tincoin::api::{create_router, ApiState};
use tincoin::config::ProcessConfig;
use tincoin::network::{GossipConfig, GossipNode};
use tincoin::node::Node;
use tincoin::storage::BlockStore;

#[derive(Parser)]
#[command(name = "tincoin")]
#[command(version)]
#[command(about = "A miniature Bitcoin-style full node", long_about = None)]
struct Cli {
    /// HTTP ingress port (overrides TINCOIN_HTTP_PORT)
    #[arg(long)]
    http_port: Option<u16>,

    /// Peer-protocol port (overrides TINCOIN_P2P_PORT)
    #[arg(long)]
    p2p_port: Option<u16>,

    /// Seed peers, comma-separated host:port (overrides TINCOIN_PEERS)
    #[arg(long)]
    peers: Option<String>,

    /// Data directory (overrides TINCOIN_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("startup failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = ProcessConfig::from_env()?;
    if let Some(port) = cli.http_port {
        config.http_port = port;
    }
    if let Some(port) = cli.p2p_port {
        config.p2p_port = port;
    }
    if let Some(peers) = cli.peers {
        config.peers = peers.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(config))
}

async fn serve(config: ProcessConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = BlockStore::open(&config.data_dir)?;
    let node = Arc::new(Node::open(store)?);
    log::info!(
        "node ready at height {}",
        node.block_count().await.saturating_sub(1)
    );

    let gossip = Arc::new(GossipNode::new(
        GossipConfig {
            port: config.p2p_port,
            peers: config.peers.clone(),
        },
        node.clone(),
    ));
    let peers = gossip.peer_manager();

    tokio::spawn(async move {
        if let Err(e) = gossip.start().await {
            log::error!("gossip node error: {e}");
        }
    });

    let app = create_router(ApiState { node, peers });
    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("http ingress listening on {addr}");

    tokio::spawn(async {
        tokio::signal::ctrl_c().await.ok();
        log::info!("shutting down");
        std::process::exit(0);
    });

    axum::serve(listener, app).await?;
    Ok(())
}
