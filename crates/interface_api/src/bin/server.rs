//! Water Billing - API Server Binary
//!
//! Starts the HTTP API and the daily overdue sweep.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin water-billing-api
//!
//! # Run with environment variables
//! API_PORT=8080 API_DATABASE_URL=postgres://... cargo run --bin water-billing-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_LOG_LEVEL` - Log level when `RUST_LOG` is unset (default: info)
//! * `API_LOG_JSON` - Emit JSON log lines (default: false)
//! * `API_SMS_TOKEN` - SMS gateway token; texts are only logged without it
//! * `API_SWEEP_HOUR` - Local hour of the overdue sweep (default: 2)
//! * `API_TIMEZONE` - IANA timezone (default: Asia/Manila)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use core_kernel::{NoopNotificationSender, NotificationSender};
use infra_db::{
    create_pool, run_migrations, DatabaseConfig, PostgresAuditSink, PostgresBillingStore,
    PostgresOtpStore, PostgresSettingsProvider,
};
use interface_api::{
    config::ApiConfig, create_router, scheduler, sms::HttpSmsSender, AppState, Ports,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("invalid API_* configuration")?;
    init_tracing(&config);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        timezone = %config.timezone,
        "Starting water billing API server"
    );

    let pool = create_pool(DatabaseConfig {
        max_connections: config.max_connections,
        ..DatabaseConfig::new(config.database_url.clone())
    })
    .await
    .context("failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("failed to apply migrations")?;

    let notifier: Arc<dyn NotificationSender> = match config.sms_token.as_deref() {
        Some(token) if config.sms_enabled() => Arc::new(
            HttpSmsSender::new(&config.sms_endpoint, token, &config.sms_sender)
                .context("failed to build SMS sender")?,
        ),
        _ => {
            tracing::warn!("API_SMS_TOKEN not set; outbound texts will only be logged");
            Arc::new(NoopNotificationSender)
        }
    };

    let ports = Ports {
        store: Arc::new(PostgresBillingStore::new(pool.clone())),
        settings: Arc::new(PostgresSettingsProvider::new(pool.clone())),
        audit: Arc::new(PostgresAuditSink::new(pool.clone())),
        notifier,
        otp_store: Arc::new(PostgresOtpStore::new(pool)),
    };
    let state = AppState::new(ports, config.clone());

    let sweep = scheduler::spawn_daily_sweep(state.clone());
    let app = create_router(state);

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .context("invalid server address")?;
    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweep.abort();
    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ApiConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
