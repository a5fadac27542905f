// src/handlers/questions.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::question::QuestionFilter,
    services::questions,
    store::QuizStore,
};

/// Lists published questions without answer keys.
/// Supports optional filtering by category and difficulty.
pub async fn list_questions(
    State(store): State<Arc<dyn QuizStore>>,
    Query(filter): Query<QuestionFilter>,
) -> Result<impl IntoResponse, AppError> {
    let list = questions::list_published(store.as_ref(), filter).await?;
    Ok(Json(list))
}
