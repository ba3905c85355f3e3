//! HTTP ingress router

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::handlers::{self, ApiState};

/// Build the ingress router with permissive CORS (explorers run in the
/// browser)
pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/config", get(handlers::get_config))
        .route("/chain", get(handlers::get_chain))
        .route("/tip", get(handlers::get_tip))
        .route("/block/candidate/{addr}", get(handlers::get_candidate))
        .route("/block/{h}", get(handlers::get_block))
        .route("/mempool", get(handlers::get_mempool))
        .route("/utxos/{addr}", get(handlers::get_utxos))
        .route("/tx/{id}", get(handlers::get_transaction))
        .route("/transactions", post(handlers::submit_transaction))
        .route("/blocks", post(handlers::submit_block))
        .with_state(state)
        .layer(cors)
}
