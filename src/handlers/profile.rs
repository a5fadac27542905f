use std::sync::Arc;

use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{MeResponse, StudyPreferences},
    services::analytics,
    store::{QuizStore, StoreError},
    utils::jwt::Claims,
};

/// Get current user's profile and statistics.
/// The profile is created on first access.
pub async fn get_me(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let profile = store
        .get_or_create_profile(user_id, &claims.display_name(), Utc::now())
        .await?;
    let rank = store.rank_of(user_id).await?;

    Ok(Json(MeResponse {
        accuracy: profile.accuracy(),
        rank,
        profile,
    }))
}

/// Replace the current user's study preferences.
pub async fn update_preferences(
    State(store): State<Arc<dyn QuizStore>>,
    Extension(claims): Extension<Claims>,
    Json(preferences): Json<StudyPreferences>,
) -> Result<impl IntoResponse, AppError> {
    preferences.validate()?;
    let user_id = claims.user_id()?;

    let mut attempt = 0;
    loop {
        let mut profile = store
            .get_or_create_profile(user_id, &claims.display_name(), Utc::now())
            .await?;
        profile.preferences = preferences.clone();
        profile.updated_at = Utc::now();

        match store.save_profile(profile).await {
            Ok(saved) => return Ok(Json(saved.preferences)),
            Err(StoreError::VersionConflict) if attempt == 0 => attempt += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Score analytics over the user's recent completed sessions.
pub async fn get_analytics(
    State(store): State<Arc<dyn QuizStore>>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let report = analytics::report_for(store.as_ref(), user_id, config.analytics_history_limit).await?;
    Ok(Json(report))
}
