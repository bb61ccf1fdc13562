//! Operator endpoints for the backup engine and catalog. All routes sit
//! behind the admin gate.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::middleware::{AuthSession, RequestMeta};
use crate::startup::AppState;
use service_core::error::AppError;

/// Trigger a manual backup run. Rejected with 409 while a run is already in
/// progress.
///
/// POST /api/backups
pub async fn create_backup(
    State(state): State<AppState>,
    AuthSession(identity): AuthSession,
    meta: RequestMeta,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let record = state.backups.trigger().await?;

    state.audit.log_system_action(
        &identity.user_id,
        "backup",
        Some(&record.id),
        "manual backup created",
        &meta,
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "backup": record })),
    ))
}

/// List cataloged backup artifacts, newest first.
///
/// GET /api/backups
pub async fn list_backups(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let backups = state.backups.catalog().list().await?;
    Ok(Json(json!({
        "success": true,
        "count": backups.len(),
        "backups": backups,
    })))
}

/// Delete one backup artifact. Missing ids are a 404, not a silent success.
///
/// DELETE /api/backups/:id
pub async fn delete_backup(
    State(state): State<AppState>,
    AuthSession(identity): AuthSession,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.backups.catalog().delete(&id).await?;

    state
        .audit
        .log_delete(&identity.user_id, "backup", &id, None, &meta);

    Ok(Json(json!({ "success": true, "deleted": id })))
}

/// Start (or confirm) the backup scheduler.
///
/// POST /api/backups/scheduler/start
pub async fn start_scheduler(
    State(state): State<AppState>,
    AuthSession(identity): AuthSession,
    meta: RequestMeta,
) -> Json<Value> {
    let status = state.backups.start();

    state.audit.log_system_action(
        &identity.user_id,
        "backup_scheduler",
        None,
        "scheduler start requested",
        &meta,
    );

    Json(json!({ "success": true, "scheduler": status }))
}

/// Report scheduler state and the outcome of the most recent run.
///
/// GET /api/backups/scheduler/status
pub async fn scheduler_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "success": true, "scheduler": state.backups.status() }))
}
