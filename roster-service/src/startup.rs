//! Router assembly and shared application state.

use axum::http::{header, HeaderValue, Method};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use service_core::middleware::tracing::request_id_middleware;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::RosterConfig;
use crate::handlers::{
    auth::{login, logout, whoami},
    backups::{create_backup, delete_backup, list_backups, scheduler_status, start_scheduler},
    health::{health_check, metrics_endpoint, readiness_check},
};
use crate::middleware::{admin_middleware, auth_middleware};
use crate::services::{AuditRecorder, JwtService, MongoDb, SnapshotEngine};

#[derive(Clone)]
pub struct AppState {
    pub config: RosterConfig,
    pub db: MongoDb,
    pub jwt: JwtService,
    pub audit: AuditRecorder,
    pub backups: SnapshotEngine,
}

pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/api/backups", post(create_backup).get(list_backups))
        .route("/api/backups/:id", delete(delete_backup))
        .route("/api/backups/scheduler/start", post(start_scheduler))
        .route("/api/backups/scheduler/status", get(scheduler_status))
        .layer(from_fn_with_state(state.clone(), admin_middleware));

    let session_routes = Router::new()
        .route("/auth/me", get(whoami))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .merge(session_routes)
        .merge(admin_routes)
        .layer(cors_layer(&state.config))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

fn cors_layer(config: &RosterConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
