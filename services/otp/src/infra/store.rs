//! In-memory store of active access codes.
//!
//! A code is present iff it has neither expired nor been consumed. Every
//! operation runs as one critical section over the map, so `issue`,
//! `validate` and `sweep` never observe each other half-done.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::domain::generator::CodeGenerator;
use crate::domain::repository::Clock;
use crate::domain::types::{ActiveCode, CodeEntry, IssuedCode, Rejection, Verdict};
use crate::error::GateError;

pub struct CodeStore {
    entries: Mutex<HashMap<String, CodeEntry>>,
    generator: CodeGenerator,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl CodeStore {
    pub fn new(generator: CodeGenerator, ttl: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            generator,
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    pub fn code_len(&self) -> usize {
        self.generator.len()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // A panic while holding the lock cannot leave the map half-written (all
    // mutations are single insert/remove/retain calls), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CodeEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mint a fresh code for `requester` and record it.
    ///
    /// Retries generation until the code is not already active.
    pub fn issue(&self, requester: &str) -> Result<IssuedCode, GateError> {
        let mut entries = self.lock();
        if entries.len() as u64 >= self.generator.space() {
            // Expired but unswept entries still occupy the space.
            let now = self.clock.now();
            entries.retain(|_, entry| !entry.is_expired(now, self.ttl));
            if entries.len() as u64 >= self.generator.space() {
                return Err(GateError::CodeSpaceExhausted);
            }
        }
        let code = loop {
            let candidate = self.generator.generate();
            if !entries.contains_key(candidate.as_str()) {
                break candidate;
            }
            debug!("generated code collided with an active one, retrying");
        };
        let issued_at = self.clock.now();
        entries.insert(
            code.as_str().to_owned(),
            CodeEntry {
                code: code.clone(),
                requester: requester.to_owned(),
                issued_at,
            },
        );
        debug!(requester, active = entries.len(), "access code issued");
        Ok(IssuedCode {
            code,
            issued_at,
            expires_at: issued_at + self.ttl,
        })
    }

    /// Look up and consume `code`. Both outcomes that find an entry remove it.
    pub fn validate(&self, code: &str) -> Verdict {
        let mut entries = self.lock();
        let Some(entry) = entries.remove(code) else {
            return Verdict::Rejected(Rejection::Invalid);
        };
        if entry.is_expired(self.clock.now(), self.ttl) {
            debug!(requester = %entry.requester, "access code expired before use");
            return Verdict::Rejected(Rejection::Expired);
        }
        debug!(requester = %entry.requester, "access code consumed");
        Verdict::Accepted
    }

    /// Drop every entry older than the TTL at `now`. Returns the number purged.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now, self.ttl));
        before - entries.len()
    }

    /// Raw entry count, including expired entries not yet swept.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Entries still within their TTL right now.
    pub fn active_count(&self) -> usize {
        let now = self.clock.now();
        self.lock()
            .values()
            .filter(|e| !e.is_expired(now, self.ttl))
            .count()
    }

    /// Snapshot of unexpired codes, oldest first.
    pub fn active_codes(&self) -> Vec<ActiveCode> {
        let now = self.clock.now();
        let mut rows: Vec<ActiveCode> = self
            .lock()
            .values()
            .filter(|e| !e.is_expired(now, self.ttl))
            .map(|e| ActiveCode {
                code: e.code.clone(),
                requester: e.requester.clone(),
                issued_at: e.issued_at,
                remaining_secs: e.remaining_secs(now, self.ttl),
            })
            .collect();
        rows.sort_by(|a, b| {
            a.issued_at
                .cmp(&b.issued_at)
                .then_with(|| a.code.as_str().cmp(b.code.as_str()))
        });
        rows
    }
}
