use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::domain::address::EmailAddress;
use crate::domain::repository::{CodeNotice, CodeNotifier};
use crate::domain::types::{ANONYMOUS_REQUESTER, AccessCode};
use crate::error::GateError;
use crate::infra::store::CodeStore;
use crate::usecase::delivery::dispatch;

pub struct IssueCodeInput {
    /// Where to send the code. `None` issues an anonymous code that is only
    /// disclosed through debug surfaces.
    pub email: Option<String>,
}

#[derive(Debug)]
pub struct IssueCodeOutput {
    pub code: AccessCode,
    pub valid_for_secs: u64,
    /// Background delivery, present when an address was given.
    pub delivery: Option<JoinHandle<()>>,
}

pub struct IssueCodeUseCase {
    pub store: Arc<CodeStore>,
    pub notifier: Arc<dyn CodeNotifier>,
}

impl IssueCodeUseCase {
    pub fn execute(&self, input: IssueCodeInput) -> Result<IssueCodeOutput, GateError> {
        // 1. Validate the address (blank counts as absent)
        let email = match input.email.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(EmailAddress::parse(raw).map_err(|_| GateError::InvalidEmail)?),
        };

        // 2. Commit the code before any I/O
        let requester = email
            .as_ref()
            .map_or_else(|| ANONYMOUS_REQUESTER.to_owned(), ToString::to_string);
        let issued = self.store.issue(&requester)?;
        let valid_for_secs = issued.remaining_secs(issued.issued_at);

        // 3. Deliver without waiting
        let delivery = email.map(|to| {
            dispatch(
                Arc::clone(&self.notifier),
                CodeNotice {
                    to: to.to_string(),
                    code: issued.code.clone(),
                    valid_for_secs,
                },
            )
        });

        Ok(IssueCodeOutput {
            code: issued.code,
            valid_for_secs,
            delivery,
        })
    }
}
