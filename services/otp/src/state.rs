use std::sync::Arc;
use std::time::Instant;

use crate::domain::repository::CodeNotifier;
use crate::infra::store::CodeStore;
use crate::usecase::intake::MailIntake;
use crate::usecase::issue::IssueCodeUseCase;
use crate::usecase::validate::ValidateCodeUseCase;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CodeStore>,
    pub notifier: Arc<dyn CodeNotifier>,
    pub debug: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<CodeStore>, notifier: Arc<dyn CodeNotifier>, debug: bool) -> Self {
        Self {
            store,
            notifier,
            debug,
            started_at: Instant::now(),
        }
    }

    pub fn issue_usecase(&self) -> IssueCodeUseCase {
        IssueCodeUseCase {
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
        }
    }

    pub fn validate_usecase(&self) -> ValidateCodeUseCase {
        ValidateCodeUseCase {
            store: Arc::clone(&self.store),
        }
    }

    pub fn mail_intake(&self) -> MailIntake {
        MailIntake {
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
        }
    }
}
