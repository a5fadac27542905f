// src/handlers/admin.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::question::{QuestionFilter, QuestionInput, StatusChangeRequest},
    services::questions,
    store::QuizStore,
    utils::jwt::Claims,
};

/// Lists questions in any workflow status, answer keys included.
/// Admin only.
pub async fn list_questions(
    State(store): State<Arc<dyn QuizStore>>,
    Query(filter): Query<QuestionFilter>,
) -> Result<impl IntoResponse, AppError> {
    let list = questions::list_all(store.as_ref(), filter).await?;
    Ok(Json(list))
}

/// Creates a new draft question.
/// Admin only.
pub async fn create_question(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<QuestionInput>,
) -> Result<impl IntoResponse, AppError> {
    let question = questions::create(store.as_ref(), payload, Utc::now()).await?;
    tracing::info!(question_id = question.id, author = %claims.sub, "Admin created question");
    Ok((StatusCode::CREATED, Json(question)))
}

/// Edits a question's content.
/// Admin only.
pub async fn update_question(
    State(store): State<Arc<dyn QuizStore>>,
    Path(id): Path<i64>,
    Json(payload): Json<QuestionInput>,
) -> Result<impl IntoResponse, AppError> {
    let question = questions::update(store.as_ref(), id, payload, Utc::now()).await?;
    Ok(Json(question))
}

/// Moves a question through draft -> review -> published -> archived.
/// Admin only.
pub async fn change_status(
    State(store): State<Arc<dyn QuizStore>>,
    Path(id): Path<i64>,
    Json(payload): Json<StatusChangeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = questions::change_status(store.as_ref(), id, payload.status, Utc::now()).await?;
    Ok(Json(question))
}
