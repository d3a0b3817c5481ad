use std::time::Instant;

use axum::http::StatusCode;

/// Handler for `GET /healthz`: liveness check.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Handler for `GET /readyz`: the service holds no external dependencies that
/// could be unready, so this mirrors liveness.
pub async fn readyz() -> StatusCode {
    StatusCode::OK
}

/// Whole seconds elapsed since `started`.
pub fn uptime_secs(started: Instant) -> u64 {
    started.elapsed().as_secs()
}
