// src/handlers/diagnostics.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::diagnostics::{RecoveryReport, ReportErrorRequest},
    services::diagnostics::DiagnosticsRegistry,
    utils::jwt::Claims,
};

/// Records a client-side error and returns its correlation id plus the
/// suggested recovery action.
pub async fn report_error(
    State(registry): State<Arc<DiagnosticsRegistry>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReportErrorRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let user_id = claims.user_id()?;
    let recorded = registry.record(user_id, req, Utc::now()).await;
    Ok((StatusCode::CREATED, Json(recorded)))
}

/// Lists the user's recorded errors, newest first.
pub async fn list_errors(
    State(registry): State<Arc<DiagnosticsRegistry>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(registry.events(user_id).await))
}

/// Resets the log, the last-resort recovery.
pub async fn clear_errors(
    State(registry): State<Arc<DiagnosticsRegistry>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let cleared = registry.clear(user_id).await;
    Ok(Json(json!({ "cleared": cleared })))
}

pub async fn report_recovery(
    State(registry): State<Arc<DiagnosticsRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<RecoveryReport>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let outcome = registry
        .recover(user_id, id, req.succeeded, Utc::now())
        .await
        .ok_or(AppError::NotFound("Error event not found".to_string()))?;
    Ok(Json(outcome))
}

pub async fn get_health(
    State(registry): State<Arc<DiagnosticsRegistry>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(registry.health(user_id).await))
}
