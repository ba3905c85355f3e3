//! HTTP ingress handlers
//!
//! The request/response surface for wallet CLIs, miners and explorers.
//! Reads take snapshots of the shared state; submissions run through the
//! node's critical section and, when accepted, fan out to the gossip mesh.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::config::ConsensusConfig;
use crate::core::block::Block;
use crate::core::transaction::Transaction;
use crate::network::message::Message;
use crate::network::peer::PeerManager;
use crate::node::Node;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ApiState {
    pub node: Arc<Node>,
    pub peers: Arc<PeerManager>,
}

/// Error body: `{"error": "..."}` with the verbatim rejection reason
#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    fn new(error: impl ToString) -> Json<Self> {
        Json(Self {
            error: error.to_string(),
        })
    }
}

#[derive(Serialize)]
pub struct SubmitTxResponse {
    pub ok: bool,
    pub id: String,
}

#[derive(Serialize)]
pub struct SubmitBlockResponse {
    pub ok: bool,
    pub height: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoInfo {
    pub txid: String,
    pub index: u32,
    pub amount: u64,
    pub block_height: u64,
    pub is_coinbase: bool,
}

#[derive(Serialize)]
pub struct UtxosResponse {
    pub utxos: Vec<UtxoInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxLookupResponse {
    pub tx: Transaction,
    pub block_height: Option<u64>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// GET /config: the live consensus parameters
pub async fn get_config(State(state): State<ApiState>) -> Json<ConsensusConfig> {
    Json(state.node.consensus_config().await)
}

/// GET /chain: the entire chain, height-ordered
pub async fn get_chain(State(state): State<ApiState>) -> Json<Vec<Block>> {
    Json(state.node.chain_snapshot().await)
}

/// GET /tip: the last block, or null for an empty chain
pub async fn get_tip(State(state): State<ApiState>) -> Json<Option<Block>> {
    Json(state.node.tip().await)
}

/// GET /block/{h}: block by height
pub async fn get_block(
    State(state): State<ApiState>,
    Path(height): Path<u64>,
) -> Result<Json<Block>, (StatusCode, Json<ApiError>)> {
    match state.node.block_at(height).await {
        Some(block) => Ok(Json(block)),
        None => Err((
            StatusCode::NOT_FOUND,
            ApiError::new(format!("no block at height {height}")),
        )),
    }
}

/// GET /mempool: pending transactions in admission order
pub async fn get_mempool(State(state): State<ApiState>) -> Json<Vec<Transaction>> {
    Json(state.node.mempool_snapshot().await)
}

/// GET /utxos/{addr}: spendable outputs for an address
pub async fn get_utxos(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Json<UtxosResponse> {
    let utxos = state
        .node
        .utxos_for_address(&address)
        .await
        .into_iter()
        .map(|(outpoint, entry)| UtxoInfo {
            txid: outpoint.txid,
            index: outpoint.index,
            amount: entry.amount,
            block_height: entry.block_height,
            is_coinbase: entry.is_coinbase,
        })
        .collect();
    Json(UtxosResponse { utxos })
}

/// GET /tx/{id}: transaction by id, on the chain or in the mempool
pub async fn get_transaction(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<TxLookupResponse>, (StatusCode, Json<ApiError>)> {
    match state.node.find_transaction(&id).await {
        Some((tx, block_height)) => Ok(Json(TxLookupResponse { tx, block_height })),
        None => Err((
            StatusCode::NOT_FOUND,
            ApiError::new(format!("unknown transaction {id}")),
        )),
    }
}

/// POST /transactions: submit a signed transaction
pub async fn submit_transaction(
    State(state): State<ApiState>,
    payload: Result<Json<Transaction>, JsonRejection>,
) -> Result<Json<SubmitTxResponse>, (StatusCode, Json<ApiError>)> {
    let Json(tx) = payload
        .map_err(|rejection| (StatusCode::BAD_REQUEST, ApiError::new(rejection.body_text())))?;

    match state.node.submit_transaction(tx.clone()).await {
        Ok(id) => {
            state.peers.broadcast(Message::Tx { tx }).await;
            Ok(Json(SubmitTxResponse { ok: true, id }))
        }
        Err(e) => Err((StatusCode::BAD_REQUEST, ApiError::new(e))),
    }
}

/// POST /blocks: submit a solved block
pub async fn submit_block(
    State(state): State<ApiState>,
    payload: Result<Json<Block>, JsonRejection>,
) -> Result<Json<SubmitBlockResponse>, (StatusCode, Json<ApiError>)> {
    let Json(block) = payload
        .map_err(|rejection| (StatusCode::BAD_REQUEST, ApiError::new(rejection.body_text())))?;

    match state.node.submit_block(block.clone()).await {
        Ok(height) => {
            state.peers.broadcast(Message::Block { block }).await;
            Ok(Json(SubmitBlockResponse { ok: true, height }))
        }
        Err(e) => Err((StatusCode::BAD_REQUEST, ApiError::new(e))),
    }
}

/// GET /block/candidate/{addr}: unsolved block template for a miner
pub async fn get_candidate(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<Json<Block>, (StatusCode, Json<ApiError>)> {
    match state.node.build_candidate(&address).await {
        Ok(candidate) => Ok(Json(candidate)),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, ApiError::new(e))),
    }
}
