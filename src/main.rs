use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use cybershop_api::config::{init_tracing, load_config};
use cybershop_api::db::{self, DbConfig};
use cybershop_api::events::{process_events, EventSender};
use cybershop_api::services::payments::{PaymentProvider, StripeCheckout, UnconfiguredProvider};
use cybershop_api::services::users::{HttpSms, LoggingSms, SmsSender};
use cybershop_api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(&config.log_level, config.log_json);

    info!(
        environment = %config.environment,
        host = %config.host,
        port = config.port,
        "starting cybershop-api"
    );

    let pool = db::establish_connection_with_config(&DbConfig::from_app_config(&config))
        .await
        .context("failed to connect to the database")?;
    db::check_connection(&pool).await.context("database ping failed")?;

    if config.auto_migrate {
        db::run_migrations(&pool).await.context("migrations failed")?;
    }

    let (tx, rx) = mpsc::channel(config.event_channel_capacity);
    let event_sender = Arc::new(EventSender::new(tx));
    tokio::spawn(process_events(rx));

    let provider: Arc<dyn PaymentProvider> = match StripeCheckout::from_config(&config) {
        Some(stripe) => Arc::new(stripe),
        None => {
            warn!("no Stripe secret key configured, online checkout is disabled");
            Arc::new(UnconfiguredProvider)
        }
    };

    let sms: Arc<dyn SmsSender> = match HttpSms::from_config(&config) {
        Some(http) => Arc::new(http),
        None => {
            warn!("no SMS gateway configured, OTP codes are written to the log");
            Arc::new(LoggingSms)
        }
    };

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(
        Arc::new(pool),
        Arc::new(config),
        event_sender,
        provider,
        sms,
    );
    let app = build_app(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to install ctrl-c handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => warn!("failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}
