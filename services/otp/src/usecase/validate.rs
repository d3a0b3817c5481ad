use std::sync::Arc;

use tracing::info;

use crate::domain::types::{DenyReason, ValidationOutcome};
use crate::infra::store::CodeStore;

pub struct ValidateCodeUseCase {
    pub store: Arc<CodeStore>,
}

impl ValidateCodeUseCase {
    /// Check and consume `candidate`. Leading and trailing whitespace is
    /// dropped; anything else counts toward the length. A candidate of the
    /// wrong length never reaches the store.
    pub fn execute(&self, candidate: &str) -> ValidationOutcome {
        let candidate = candidate.trim();

        let outcome = if candidate.chars().count() != self.store.code_len() {
            ValidationOutcome::Denied(DenyReason::Malformed)
        } else {
            self.store.validate(candidate).into()
        };

        match outcome.reason() {
            None => info!("access granted"),
            Some(reason) => info!(reason = reason.kind(), "access denied"),
        }
        outcome
    }
}
