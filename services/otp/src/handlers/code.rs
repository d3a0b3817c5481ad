use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::domain::types::DenyReason;
use crate::error::GateError;
use crate::state::AppState;
use crate::usecase::issue::IssueCodeInput;

// ── POST /code/request ────────────────────────────────────────────────────────

#[derive(Default, Deserialize)]
pub struct RequestCodeRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct RequestCodeResponse {
    pub message: &'static str,
    pub valid_for_secs: u64,
    /// Raw code, only in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// The body is optional: an empty body issues an anonymous code.
pub async fn request_code(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<RequestCodeResponse>), GateError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RequestCodeRequest::default()
    } else {
        parse_json(&body)?
    };

    let output = state.issue_usecase().execute(IssueCodeInput {
        email: request.email,
    })?;

    let message = if output.delivery.is_some() {
        "access code sent by email"
    } else {
        "access code issued"
    };
    let body = RequestCodeResponse {
        message,
        valid_for_secs: output.valid_for_secs,
        code: state.debug.then(|| output.code.to_string()),
    };
    Ok((StatusCode::CREATED, Json(body)))
}

// ── POST /code/validate ───────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ValidateCodeRequest {
    pub code: String,
}

#[derive(Serialize)]
pub struct ValidateCodeResponse {
    pub granted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
    pub message: String,
}

/// Every outcome, including denial, is a 200 with a structured body. Only a
/// body that is not `{"code": "<string>"}` is refused.
pub async fn validate_code(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ValidateCodeResponse>, GateError> {
    let request: ValidateCodeRequest = parse_json(&body)?;
    let outcome = state.validate_usecase().execute(&request.code);
    Ok(Json(ValidateCodeResponse {
        granted: outcome.is_granted(),
        reason: outcome.reason(),
        message: outcome.message(state.store.code_len()),
    }))
}

// Content-Type is not checked; clients post these bodies bare.
fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, GateError> {
    serde_json::from_slice(body).map_err(|e| GateError::InvalidBody(e.to_string()))
}
