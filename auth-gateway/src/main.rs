use std::net::SocketAddr;
use std::sync::Arc;

use auth_gateway::{
    build_router,
    config::GatewayConfig,
    db,
    services::{ConsoleEmailService, EmailProvider, EmailService, IdentityStore, InMemoryStore, PgIdentityStore, ServiceError},
    AppState,
};
use service_core::error::AppError;
use service_core::middleware::install_prometheus_recorder;
use service_core::observability::init_tracing;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = GatewayConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    let metrics = install_prometheus_recorder()?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting auth gateway"
    );

    let store: Arc<dyn IdentityStore> = match &config.database {
        Some(database) => {
            let pool = db::create_pool(database).await.map_err(ServiceError::Database)?;
            db::run_migrations(&pool)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
            Arc::new(PgIdentityStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set - using in-memory identity store, data is lost on restart");
            Arc::new(InMemoryStore::new())
        }
    };

    let email: Arc<dyn EmailProvider> = match &config.email.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "SMTP mailer initialized");
            Arc::new(EmailService::new(smtp)?)
        }
        None => {
            tracing::info!("SMTP_HOST not set - emails will be logged");
            Arc::new(ConsoleEmailService)
        }
    };

    if config.api.keys.is_empty() {
        tracing::info!("No API keys configured - API token access disabled");
    }

    let state = AppState::new(config.clone(), store, email, Some(metrics))?;
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
