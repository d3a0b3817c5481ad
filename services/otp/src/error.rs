use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Service error variants. Validation denials are not errors; they are
/// ordinary [`ValidationOutcome`](crate::domain::types::ValidationOutcome)s.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("request body is not valid JSON: {0}")]
    InvalidBody(String),
    #[error("invalid email address")]
    InvalidEmail,
    #[error("no free access codes left")]
    CodeSpaceExhausted,
    #[error("delivery failed: {0}")]
    Delivery(#[source] anyhow::Error),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl GateError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidBody(_) => "INVALID_BODY",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::CodeSpaceExhausted => "CODE_SPACE_EXHAUSTED",
            Self::Delivery(_) => "DELIVERY_FAILED",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidBody(_) | Self::InvalidEmail => StatusCode::BAD_REQUEST,
            Self::CodeSpaceExhausted => StatusCode::SERVICE_UNAVAILABLE,
            Self::Delivery(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // TraceLayer records method/uri/status for every request; only server-side
        // failures need their cause chain logged here.
        match &self {
            Self::Internal(e) | Self::Delivery(e) => {
                tracing::error!(error = %e, kind = self.kind(), "request failed");
            }
            Self::CodeSpaceExhausted => {
                tracing::warn!(kind = self.kind(), "code space exhausted");
            }
            Self::InvalidBody(_) | Self::InvalidEmail => {}
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
