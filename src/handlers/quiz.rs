// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::{
        session::{SessionListParams, StartSessionRequest, SubmitAnswerRequest},
        user::{LeaderboardEntry, LeaderboardParams},
    },
    services::session,
    store::QuizStore,
    utils::jwt::Claims,
};

/// Starts a new quiz session.
///
/// * quick: 10 questions, untimed.
/// * timed: 20 questions, 90 seconds each.
/// * custom: caller picks the count and an optional time limit.
pub async fn create_session(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let view =
        session::start_session(store.as_ref(), user_id, &claims.display_name(), req, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Lists the current user's sessions, newest first.
pub async fn list_sessions(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<SessionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let list = session::list_sessions(store.as_ref(), user_id, params, Utc::now()).await?;
    Ok(Json(list))
}

/// Full session view. Answer keys are only included once the session has ended.
pub async fn get_session(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let view = session::get_session(store.as_ref(), id, user_id, Utc::now()).await?;
    Ok(Json(view))
}

pub async fn submit_answer(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let outcome = session::submit_answer(store.as_ref(), id, user_id, req, Utc::now()).await?;
    Ok(Json(outcome))
}

pub async fn pause_session(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(session::pause(store.as_ref(), id, user_id, Utc::now()).await?))
}

pub async fn resume_session(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(session::resume(store.as_ref(), id, user_id, Utc::now()).await?))
}

/// Ends the session: completed if every question is answered or time is up,
/// abandoned otherwise. Returns the review view.
pub async fn finish_session(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(session::finish(store.as_ref(), id, user_id, Utc::now()).await?))
}

pub async fn abandon_session(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(session::abandon(store.as_ref(), id, user_id, Utc::now()).await?))
}

/// Retrieves the top profiles by points.
pub async fn get_leaderboard(
    State(store): State<Arc<dyn QuizStore>>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let profiles = store.leaderboard(limit).await?;

    let leaderboard: Vec<LeaderboardEntry> = profiles
        .into_iter()
        .enumerate()
        .map(|(i, p)| LeaderboardEntry {
            rank: i + 1,
            user_id: p.id,
            display_name: p.display_name,
            points: p.points,
            level: p.level,
            current_streak: p.current_streak,
        })
        .collect();

    Ok(Json(leaderboard))
}
