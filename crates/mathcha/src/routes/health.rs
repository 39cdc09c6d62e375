//! Health check endpoint.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// CAPTCHAs currently tracked (pending and ready)
    pub tracked: usize,
    pub uptime_secs: u64,
}

/// Basic health check (is the server running?)
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tracked: state.captchas.len().await,
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
