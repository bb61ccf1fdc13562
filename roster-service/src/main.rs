use std::sync::Arc;

use roster_service::config::RosterConfig;
use roster_service::services::{init_metrics, AuditRecorder, JwtService, MongoDb, SnapshotEngine};
use roster_service::startup::{build_router, AppState};
use service_core::observability::init_tracing;
use tokio::net::TcpListener;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Metrics recorder must be installed before any metrics are recorded.
    init_metrics();

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    init_tracing("roster-service", &log_level);

    let config = RosterConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            std::io::Error::other(format!("Database connection error: {}", e))
        })?;

    db.initialize_indexes().await.map_err(|e| {
        tracing::error!("Failed to initialize database indexes: {}", e);
        std::io::Error::other(format!("Database initialization error: {}", e))
    })?;

    let jwt = JwtService::new(&config.auth.jwt_secret, config.auth.session_ttl_hours);
    let audit = AuditRecorder::new(db.clone());

    // The scheduler is owned here, started at bootstrap, and stopped on
    // shutdown; there is no lazily-initialized global.
    let backups = SnapshotEngine::new(config.backup.clone(), Arc::new(db.clone()));
    if config.backup.enabled {
        backups.start();
    } else {
        tracing::info!("Backup scheduler disabled by configuration");
    }

    let state = AppState {
        config: config.clone(),
        db,
        jwt,
        audit,
        backups: backups.clone(),
    };

    let router = build_router(state);

    let addr = config.common.socket_addr().map_err(|e| {
        tracing::error!("Invalid bind address: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!("Failed to bind listener to {}: {}", addr, e);
        e
    })?;
    tracing::info!(port = config.common.port, "roster-service listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let an in-flight backup finish before exit; never leave a half-written
    // artifact behind.
    backups.shutdown().await;

    Ok(())
}
