use membership_service::{
    build_router,
    config::{MembershipConfig, PersistenceBackend, RevocationBackend},
    services::{
        DisabledIdentityStore, IdentityStore, InMemoryRevocations, PgIdentityStore,
        RedisRevocations, SessionRevocations,
    },
    AppState,
};
use service_core::error::AppError;
use service_core::middleware::metrics::install_prometheus_recorder;
use service_core::observability::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = MembershipConfig::from_env()?;

    let _tracing_guard = init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    let metrics_handle = install_prometheus_recorder()?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        persistence = config.persistence.backend.as_str(),
        revocation = config.revocation.backend.as_str(),
        "Starting membership service"
    );

    let (store, pg_store): (Arc<dyn IdentityStore>, Option<PgIdentityStore>) =
        match config.persistence.backend {
            PersistenceBackend::Postgres => {
                let database_url = config.persistence.database_url.as_ref().ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is not set"))
                })?;
                let pg = PgIdentityStore::connect(database_url, config.persistence.max_connections)
                    .await
                    .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
                (Arc::new(pg.clone()), Some(pg))
            }
            PersistenceBackend::Disabled => {
                tracing::warn!("Persistence disabled; credential operations will return 503");
                (Arc::new(DisabledIdentityStore), None)
            }
        };

    let revocations: Arc<dyn SessionRevocations> = match config.revocation.backend {
        RevocationBackend::Redis => {
            let redis_url = config.revocation.redis_url.as_ref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("REDIS_URL is not set"))
            })?;
            Arc::new(RedisRevocations::connect(redis_url).await?)
        }
        RevocationBackend::Memory => Arc::new(InMemoryRevocations::new()),
    };

    let addr = config.common.socket_addr();
    let state = AppState::new(config, store, revocations, Some(metrics_handle))?;
    let app = build_router(state)?;

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(pg) = pg_store {
        pg.close().await;
    }

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
