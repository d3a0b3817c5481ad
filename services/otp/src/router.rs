use axum::{
    Router,
    routing::{get, post},
};

use codegate_core::health::{healthz, readyz};
use codegate_core::middleware::{propagate_request_id_layer, request_id_layer, trace_layer};

use crate::handlers::{
    code::{request_code, validate_code},
    debug::list_active_codes,
    health::health,
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/health", get(health))
        // Codes
        .route("/code/request", post(request_code))
        .route("/code/validate", post(validate_code));

    if state.debug {
        router = router.route("/debug/codes", get(list_active_codes));
    }

    router
        .with_state(state)
        .layer(propagate_request_id_layer())
        .layer(trace_layer())
        .layer(request_id_layer())
}
