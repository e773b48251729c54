//! /endpoints and /peers handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::ApiState;

// ── /endpoints ────────────────────────────────────────────────────────────────

/// Addresses of known peers, loopback excluded.
pub async fn handle_endpoints(State(state): State<ApiState>) -> Json<Vec<String>> {
    Json(state.endpoints.listing())
}

// ── /peers ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PeerInfo {
    pub name: String,
    pub address: String,
}

pub async fn handle_peers(State(state): State<ApiState>) -> Json<Vec<PeerInfo>> {
    let peers = state
        .routes
        .snapshot()
        .into_iter()
        .map(|(name, address)| PeerInfo { name, address })
        .collect();
    Json(peers)
}
