//! Inbound mail intake: parse a completed message, find who sent it, issue a
//! code for them and reply.
//!
//! Nothing here is retried. A message that cannot be parsed, or that names no
//! sender, is dropped with a log line; the sender has to try again.

use std::sync::Arc;

use mail_parser::MessageParser;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::address::EmailAddress;
use crate::domain::repository::{CodeNotice, CodeNotifier};
use crate::error::GateError;
use crate::infra::store::CodeStore;
use crate::usecase::delivery::dispatch;

#[derive(Debug)]
pub enum IntakeOutcome {
    Issued {
        requester: EmailAddress,
        delivery: JoinHandle<()>,
    },
    Abandoned(AbandonReason),
}

#[derive(Debug, thiserror::Error)]
pub enum AbandonReason {
    #[error("message could not be parsed")]
    Unparseable,
    #[error("message has no usable From address")]
    NoSender,
    #[error("code issuance failed: {0}")]
    Issue(#[from] GateError),
}

#[derive(Clone)]
pub struct MailIntake {
    pub store: Arc<CodeStore>,
    pub notifier: Arc<dyn CodeNotifier>,
}

impl MailIntake {
    /// Handle one fully received message (`raw` is the DATA payload).
    pub fn receive(&self, raw: &[u8]) -> IntakeOutcome {
        match self.issue_for(raw) {
            Ok((requester, notice)) => {
                info!(requester = %requester, "access code issued for inbound mail");
                let delivery = dispatch(Arc::clone(&self.notifier), notice);
                IntakeOutcome::Issued {
                    requester,
                    delivery,
                }
            }
            Err(reason) => {
                warn!(reason = %reason, size = raw.len(), "inbound mail abandoned");
                IntakeOutcome::Abandoned(reason)
            }
        }
    }

    fn issue_for(&self, raw: &[u8]) -> Result<(EmailAddress, CodeNotice), AbandonReason> {
        let requester = extract_sender(raw)?;
        let issued = self.store.issue(&requester.to_string())?;
        let valid_for_secs = issued.remaining_secs(issued.issued_at);
        let notice = CodeNotice {
            to: requester.to_string(),
            code: issued.code,
            valid_for_secs,
        };
        Ok((requester, notice))
    }
}

/// First address of the `From` header.
pub fn extract_sender(raw: &[u8]) -> Result<EmailAddress, AbandonReason> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or(AbandonReason::Unparseable)?;
    let address = message
        .from()
        .and_then(|from| from.first())
        .and_then(|addr| addr.address())
        .ok_or(AbandonReason::NoSender)?;
    EmailAddress::parse(address).map_err(|_| AbandonReason::NoSender)
}
