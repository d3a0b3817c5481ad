use std::fmt;
use std::str::FromStr;

/// RFC 5321 limit on a forward or reverse path.
const MAX_ADDRESS_LEN: usize = 254;
const MAX_LOCAL_LEN: usize = 64;

/// A plain `local@domain` mailbox. Only the shape is checked; deliverability
/// is the outbound transport's problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    local: String,
    domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("address is too long")]
    TooLong,
    #[error("address must contain exactly one '@'")]
    MissingAt,
    #[error("address has an empty or oversized local part")]
    BadLocal,
    #[error("address has an invalid domain")]
    BadDomain,
}

impl EmailAddress {
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AddressError::Empty);
        }
        if raw.len() > MAX_ADDRESS_LEN {
            return Err(AddressError::TooLong);
        }
        let (local, domain) = raw.rsplit_once('@').ok_or(AddressError::MissingAt)?;
        if local.contains('@') {
            return Err(AddressError::MissingAt);
        }
        if local.is_empty() || local.len() > MAX_LOCAL_LEN || local.chars().any(forbidden_in_local)
        {
            return Err(AddressError::BadLocal);
        }
        if !is_valid_domain(domain) {
            return Err(AddressError::BadDomain);
        }
        Ok(Self {
            local: local.to_owned(),
            domain: domain.to_ascii_lowercase(),
        })
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    /// Lowercased domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn in_domain(&self, domain: &str) -> bool {
        self.domain.eq_ignore_ascii_case(domain.trim_end_matches('.'))
    }
}

fn forbidden_in_local(c: char) -> bool {
    c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | '(' | ')' | ',' | ';')
}

fn is_valid_domain(domain: &str) -> bool {
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    !domain.is_empty()
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

impl FromStr for EmailAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}
