//! HTTP API server for the ledger node.
//!
//! Serves the wire protocol `HttpLedgerService` speaks, plus health and
//! status endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

use indigo_ledger::{LedgerReply, LedgerTransaction, ReadQuery, ReadReply};

use crate::state::NodeState;

// --- Response types ---

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub uptime_secs: u64,
    /// Transactions written since genesis.
    pub txn_count: usize,
    pub last_seq_no: u64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(error: impl ToString) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

// --- Handlers ---

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn handle_status(State(state): State<Arc<NodeState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        txn_count: state.ledger.len(),
        last_seq_no: state.ledger.last_seq_no(),
    })
}

/// Rejections are ordinary replies; only unreadable transactions fail.
async fn handle_submit(
    State(state): State<Arc<NodeState>>,
    Json(txn): Json<LedgerTransaction>,
) -> Result<Json<LedgerReply>, ApiError> {
    tracing::debug!(txn_type = %txn.txn_type, req_id = txn.req_id, "transaction received");
    state.ledger.apply(&txn).map(Json).map_err(bad_request)
}

async fn handle_read(
    State(state): State<Arc<NodeState>>,
    Json(query): Json<ReadQuery>,
) -> Result<Json<ReadReply>, ApiError> {
    state.ledger.query(&query).map(Json).map_err(bad_request)
}

// --- Server ---

pub fn build_router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handle_health))
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/ledger/submit", post(handle_submit))
        .route("/api/v1/ledger/read", post(handle_read))
        .with_state(state)
}

pub async fn start_api_server(listen_addr: SocketAddr, state: Arc<NodeState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "HTTP API server started");
    serve(listener, state).await
}

pub async fn serve(listener: tokio::net::TcpListener, state: Arc<NodeState>) -> anyhow::Result<()> {
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
