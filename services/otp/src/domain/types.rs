use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// Default number of digits in an access code.
pub const DEFAULT_CODE_LEN: usize = 9;

/// Longest supported code; 10^18 still fits in a `u64` code-space count.
pub const MAX_CODE_LEN: usize = 18;

/// Default access code time-to-live in seconds.
pub const DEFAULT_CODE_TTL_SECS: u64 = 15;

/// Requester recorded when a code is issued without a known address.
pub const ANONYMOUS_REQUESTER: &str = "anonymous";

/// A fixed-length string of decimal digits. Leading zeros are significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AccessCode(String);

impl AccessCode {
    /// Wrap an already generated digit string.
    pub(crate) fn from_digits(digits: String) -> Self {
        debug_assert!(digits.bytes().all(|b| b.is_ascii_digit()));
        Self(digits)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Digits in groups of three separated by spaces: `003 881 204`.
    pub fn grouped(&self) -> String {
        let mut out = String::with_capacity(self.0.len() + self.0.len() / 3);
        for (i, ch) in self.0.chars().enumerate() {
            if i > 0 && i % 3 == 0 {
                out.push(' ');
            }
            out.push(ch);
        }
        out
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One active code held by the store. Entries are never updated in place.
#[derive(Debug, Clone)]
pub struct CodeEntry {
    pub code: AccessCode,
    pub requester: String,
    pub issued_at: DateTime<Utc>,
}

impl CodeEntry {
    /// Strictly older than `ttl` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now - self.issued_at > ttl
    }

    /// Whole seconds of validity left at `now`, floored at zero.
    pub fn remaining_secs(&self, now: DateTime<Utc>, ttl: TimeDelta) -> u64 {
        let left = (self.issued_at + ttl - now).num_seconds();
        u64::try_from(left).unwrap_or(0)
    }
}

/// Result of a successful `issue`.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code: AccessCode,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedCode {
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((self.expires_at - now).num_seconds()).unwrap_or(0)
    }
}

/// Store-level lookup result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Unknown code, or one that was already consumed.
    Invalid,
    /// Known code older than the TTL. The entry is removed.
    Expired,
}

/// Caller-facing validation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    Granted,
    Denied(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DenyReason {
    /// Wrong length; the store was not consulted.
    Malformed,
    Invalid,
    Expired,
}

impl DenyReason {
    pub fn kind(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::Invalid => "invalid",
            Self::Expired => "expired",
        }
    }
}

impl From<Rejection> for DenyReason {
    fn from(r: Rejection) -> Self {
        match r {
            Rejection::Invalid => Self::Invalid,
            Rejection::Expired => Self::Expired,
        }
    }
}

impl From<Verdict> for ValidationOutcome {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Accepted => Self::Granted,
            Verdict::Rejected(r) => Self::Denied(r.into()),
        }
    }
}

impl ValidationOutcome {
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }

    pub fn reason(self) -> Option<DenyReason> {
        match self {
            Self::Granted => None,
            Self::Denied(r) => Some(r),
        }
    }

    /// Human-readable message. `code_len` is quoted in the malformed case.
    pub fn message(self, code_len: usize) -> String {
        match self {
            Self::Granted => "access granted".to_owned(),
            Self::Denied(DenyReason::Malformed) => {
                format!("access code must be exactly {code_len} digits")
            }
            Self::Denied(DenyReason::Invalid) => "invalid access code".to_owned(),
            Self::Denied(DenyReason::Expired) => {
                "access code has expired, request a new one".to_owned()
            }
        }
    }
}

/// Debug listing row.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveCode {
    pub code: AccessCode,
    pub requester: String,
    #[serde(serialize_with = "codegate_core::serde::to_rfc3339_secs")]
    pub issued_at: DateTime<Utc>,
    pub remaining_secs: u64,
}
