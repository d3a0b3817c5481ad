use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;

use codegate_core::config::Config;

use crate::domain::address::EmailAddress;
use crate::domain::types::{DEFAULT_CODE_LEN, DEFAULT_CODE_TTL_SECS, MAX_CODE_LEN};
use crate::infra::mailer::RelayConfig;

/// OTP service configuration, read from `CODEGATE_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    /// Interface both listeners bind to. Env var: `CODEGATE_BIND_HOST`.
    #[serde(default = "default_bind_host")]
    pub bind_host: IpAddr,
    /// HTTP API port (default 3000). Env var: `CODEGATE_HTTP_PORT`.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Inbound SMTP port (default 2525). Env var: `CODEGATE_SMTP_PORT`.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// The only recipient domain inbound mail is accepted for.
    #[serde(default = "default_mail_domain")]
    pub mail_domain: String,
    /// Local part of the service mailbox; replies come from `<mailbox>@<mail_domain>`.
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
    #[serde(default = "default_code_ttl_secs")]
    pub code_ttl_secs: u64,
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    /// Verbose logs, raw codes in `/code/request` responses and the
    /// `/debug/codes` listing. Never enable outside a controlled deployment:
    /// it discloses every active code.
    #[serde(default)]
    pub debug: bool,
    /// Outbound relay. Without it replies go straight to the recipient's MX.
    pub relay_host: Option<String>,
    pub relay_port: Option<u16>,
    pub relay_username: Option<String>,
    pub relay_password: Option<String>,
}

fn default_bind_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_http_port() -> u16 {
    3000
}

fn default_smtp_port() -> u16 {
    2525
}

fn default_mail_domain() -> String {
    "localhost".to_owned()
}

fn default_mailbox() -> String {
    "code".to_owned()
}

fn default_code_ttl_secs() -> u64 {
    DEFAULT_CODE_TTL_SECS
}

fn default_code_length() -> usize {
    DEFAULT_CODE_LEN
}

impl Config for OtpConfig {
    const PREFIX: &'static str = "CODEGATE_";
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("CODEGATE_CODE_TTL_SECS must be greater than zero")]
    ZeroTtl,
    #[error("CODEGATE_CODE_LENGTH must be between 1 and {max}, got {0}", max = MAX_CODE_LEN)]
    CodeLength(usize),
    #[error("CODEGATE_MAILBOX and CODEGATE_MAIL_DOMAIN must form a valid address, got {0:?}")]
    Mailbox(String),
    #[error("CODEGATE_RELAY_USERNAME and CODEGATE_RELAY_PASSWORD must be set together")]
    PartialCredentials,
}

impl OtpConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.code_ttl_secs == 0 {
            return Err(ConfigError::ZeroTtl);
        }
        if !(1..=MAX_CODE_LEN).contains(&self.code_length) {
            return Err(ConfigError::CodeLength(self.code_length));
        }
        self.service_address()?;
        if self.relay_username.is_some() != self.relay_password.is_some() {
            return Err(ConfigError::PartialCredentials);
        }
        Ok(())
    }

    /// `<mailbox>@<mail_domain>`, the From of every reply.
    pub fn service_address(&self) -> Result<EmailAddress, ConfigError> {
        let raw = format!("{}@{}", self.mailbox, self.mail_domain);
        EmailAddress::parse(&raw).map_err(|_| ConfigError::Mailbox(raw))
    }

    pub fn code_ttl(&self) -> Duration {
        Duration::from_secs(self.code_ttl_secs)
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.http_port)
    }

    pub fn smtp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.smtp_port)
    }

    pub fn relay(&self) -> Option<RelayConfig> {
        let host = self.relay_host.clone().filter(|h| !h.is_empty())?;
        let credentials = self
            .relay_username
            .clone()
            .zip(self.relay_password.clone());
        Some(RelayConfig {
            host,
            port: self.relay_port,
            credentials,
        })
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_directive(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}
