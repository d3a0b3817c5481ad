use std::sync::Arc;

use anyhow::Context;
use chrono::TimeDelta;
use tracing::{error, info, warn};

use codegate_core::config::Config;
use codegate_core::listener::{self, BindError};
use codegate_core::tracing::init_tracing;

use codegate_otp::config::OtpConfig;
use codegate_otp::domain::generator::CodeGenerator;
use codegate_otp::domain::repository::{CodeNotifier, SystemClock};
use codegate_otp::infra::mailer::SmtpNotifier;
use codegate_otp::infra::smtp::{self, SmtpContext, SmtpLimits};
use codegate_otp::infra::store::CodeStore;
use codegate_otp::router::build_router;
use codegate_otp::state::AppState;
use codegate_otp::usecase::sweep::{spawn_sweeper, sweep_interval};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OtpConfig::from_env().context("failed to read CODEGATE_* configuration")?;
    config.validate()?;

    init_tracing(config.log_directive());

    if config.debug {
        warn!("debug mode is on: raw access codes are exposed over HTTP");
    }

    let service_address = config.service_address()?;
    let relay = config.relay();
    let notifier: Arc<dyn CodeNotifier> = Arc::new(
        SmtpNotifier::new(&service_address, relay.as_ref())
            .context("failed to build outbound mailer")?,
    );

    let ttl = TimeDelta::from_std(config.code_ttl()).context("CODEGATE_CODE_TTL_SECS too large")?;
    let store = Arc::new(CodeStore::new(
        CodeGenerator::new(config.code_length),
        ttl,
        Arc::new(SystemClock),
    ));
    let sweeper = spawn_sweeper(Arc::clone(&store), sweep_interval(config.code_ttl()));

    let state = AppState::new(store, notifier, config.debug);
    let smtp_ctx = Arc::new(SmtpContext {
        domain: config.mail_domain.clone(),
        limits: SmtpLimits::default(),
        intake: state.mail_intake(),
    });
    let router = build_router(state);

    info!(
        mail_domain = %config.mail_domain,
        from = %service_address,
        relay = relay.as_ref().map(|r| r.host.as_str()),
        code_length = config.code_length,
        code_ttl_secs = config.code_ttl_secs,
        "otp service starting"
    );

    // Each listener runs on its own; one failing to bind does not stop the other.
    let http_listener = async {
        let listener = listener::bind("http", config.http_addr()).await?;
        info!("http listening on {}", config.http_addr());
        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "http server stopped");
        }
        Ok::<(), BindError>(())
    };
    let smtp_listener = async {
        let listener = listener::bind("smtp", config.smtp_addr()).await?;
        info!("smtp listening on {}", config.smtp_addr());
        smtp::serve(listener, smtp_ctx).await;
        Ok::<(), BindError>(())
    };

    let result = tokio::select! {
        (http, smtp) = async { tokio::join!(report(http_listener), report(smtp_listener)) } => {
            if http.is_err() && smtp.is_err() {
                Err(anyhow::anyhow!("neither listener could be started"))
            } else {
                Ok(())
            }
        }
        () = shutdown_signal() => Ok(()),
    };

    sweeper.abort();
    info!("otp service stopped");
    result
}

/// Log a listener failure and keep its result for the exit decision.
async fn report(
    listener: impl Future<Output = Result<(), BindError>>,
) -> Result<(), BindError> {
    let result = listener.await;
    if let Err(e) = &result {
        error!(listener = e.listener(), error = %e, "listener failed");
    }
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
