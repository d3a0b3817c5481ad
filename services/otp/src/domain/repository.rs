use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::types::AccessCode;
use crate::error::GateError;

/// Source of the current time for TTL decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A code to be sent to its requester.
#[derive(Debug, Clone)]
pub struct CodeNotice {
    pub to: String,
    pub code: AccessCode,
    pub valid_for_secs: u64,
}

/// Port for delivering issued codes out of band (outbound mail in production).
#[async_trait]
pub trait CodeNotifier: Send + Sync {
    async fn deliver(&self, notice: &CodeNotice) -> Result<(), GateError>;
}
