use axum::{Json, extract::State};
use serde::Serialize;

use codegate_core::health::uptime_secs;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_codes: usize,
    pub uptime_secs: u64,
}

/// `GET /health`: informational only.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_codes: state.store.active_count(),
        uptime_secs: uptime_secs(state.started_at),
    })
}
