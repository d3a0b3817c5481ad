//! Code delivery: message composition and fire-and-forget dispatch.
//!
//! A failed delivery is logged and nothing more. The code stays in the store
//! and can still be disclosed through other channels.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::repository::{CodeNotice, CodeNotifier};

pub const SUBJECT: &str = "Your access code";

/// Rendered reply, transport-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub fn compose(notice: &CodeNotice) -> ComposedMail {
    let raw = notice.code.as_str();
    let grouped = notice.code.grouped();
    let secs = notice.valid_for_secs;
    let text = format!(
        "Your access code is: {raw}\n\
         \n\
         \x20   {grouped}\n\
         \n\
         It is valid for {secs} seconds and can be used once.\n"
    );
    let html = format!(
        "<p>Your access code is:</p>\
         <p style=\"font-family:monospace;font-size:24px;letter-spacing:2px\">{grouped}</p>\
         <p>It is valid for {secs} seconds and can be used once.</p>"
    );
    ComposedMail {
        subject: SUBJECT.to_owned(),
        text,
        html,
    }
}

/// Spawn delivery of `notice`. The returned handle only matters to tests;
/// callers normally drop it.
pub fn dispatch(notifier: Arc<dyn CodeNotifier>, notice: CodeNotice) -> JoinHandle<()> {
    tokio::spawn(async move {
        match notifier.deliver(&notice).await {
            Ok(()) => info!(to = %notice.to, "access code delivered"),
            Err(e) => warn!(to = %notice.to, error = %e, "access code delivery failed"),
        }
    })
}
