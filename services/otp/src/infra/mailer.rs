//! Outbound delivery of access codes over SMTP.
//!
//! Two routes: through a configured relay (STARTTLS, optional credentials),
//! or straight to the recipient domain's MX host when no relay is set.

use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::{Resolver, config::ResolverConfig, name_server::TokioConnectionProvider};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use crate::domain::address::EmailAddress;
use crate::domain::repository::{CodeNotice, CodeNotifier};
use crate::error::GateError;
use crate::usecase::delivery::compose;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);
const SENDER_NAME: &str = "Access codes";
const SMTP_PORT: u16 = 25;

/// Outbound relay settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: Option<u16>,
    pub credentials: Option<(String, String)>,
}

enum Route {
    Relay(AsyncSmtpTransport<Tokio1Executor>),
    Direct(Resolver<TokioConnectionProvider>),
}

pub struct SmtpNotifier {
    from: Mailbox,
    route: Route,
}

impl SmtpNotifier {
    /// Pick the route: relay when configured, direct MX delivery otherwise.
    pub fn new(from: &EmailAddress, relay: Option<&RelayConfig>) -> anyhow::Result<Self> {
        let address: Address = from.to_string().parse()?;
        let from = Mailbox::new(Some(SENDER_NAME.to_owned()), address);
        let route = match relay {
            Some(relay) => {
                let mut builder =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&relay.host)?
                        .timeout(Some(SEND_TIMEOUT));
                if let Some(port) = relay.port {
                    builder = builder.port(port);
                }
                if let Some((user, pass)) = &relay.credentials {
                    builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
                }
                Route::Relay(builder.build())
            }
            None => Route::Direct(
                Resolver::builder_with_config(
                    ResolverConfig::default(),
                    TokioConnectionProvider::default(),
                )
                .build(),
            ),
        };
        Ok(Self { from, route })
    }

    pub fn is_relay(&self) -> bool {
        matches!(self.route, Route::Relay(_))
    }

    pub fn build_message(&self, notice: &CodeNotice) -> Result<Message, GateError> {
        let to: Mailbox = notice
            .to
            .parse()
            .map_err(|e: lettre::address::AddressError| GateError::Delivery(e.into()))?;
        let mail = compose(notice);
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject)
            .multipart(MultiPart::alternative_plain_html(mail.text, mail.html))
            .map_err(|e| GateError::Delivery(e.into()))
    }
}

/// Lowest-preference MX host for `domain`, or the domain itself when it has
/// no MX records (RFC 5321 §5.1 implicit MX).
async fn mail_exchanger(resolver: &Resolver<TokioConnectionProvider>, domain: &str) -> String {
    match resolver.mx_lookup(domain).await {
        Ok(lookup) => lookup
            .iter()
            .min_by_key(|mx| mx.preference())
            .map(|mx| mx.exchange().to_utf8().trim_end_matches('.').to_owned())
            .unwrap_or_else(|| domain.to_owned()),
        Err(e) => {
            debug!(domain, error = %e, "MX lookup failed, using domain as exchanger");
            domain.to_owned()
        }
    }
}

fn recipient_domain(to: &str) -> Result<String, GateError> {
    EmailAddress::parse(to)
        .map(|addr| addr.domain().to_owned())
        .map_err(|e| GateError::Delivery(e.into()))
}

#[async_trait]
impl CodeNotifier for SmtpNotifier {
    async fn deliver(&self, notice: &CodeNotice) -> Result<(), GateError> {
        let message = self.build_message(notice)?;
        let delivery_err = |e: lettre::transport::smtp::Error| GateError::Delivery(e.into());
        match &self.route {
            Route::Relay(transport) => {
                transport.send(message).await.map_err(delivery_err)?;
            }
            Route::Direct(resolver) => {
                let domain = recipient_domain(&notice.to)?;
                let host = mail_exchanger(resolver, &domain).await;
                debug!(%host, "delivering directly to mail exchanger");
                let tls = TlsParameters::new(host.clone()).map_err(delivery_err)?;
                let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                    .port(SMTP_PORT)
                    .tls(Tls::Opportunistic(tls))
                    .timeout(Some(SEND_TIMEOUT))
                    .build();
                transport.send(message).await.map_err(delivery_err)?;
            }
        }
        Ok(())
    }
}
