//! Debug-only introspection. Routed only when debug mode is on, because it
//! discloses every active code in plain text.

use axum::{Json, extract::State};

use crate::domain::types::ActiveCode;
use crate::state::AppState;

/// `GET /debug/codes`: unexpired codes with their remaining validity.
pub async fn list_active_codes(State(state): State<AppState>) -> Json<Vec<ActiveCode>> {
    Json(state.store.active_codes())
}
