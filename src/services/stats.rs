// src/services/stats.rs

use chrono::{DateTime, Utc};

use crate::{
    config::{PERFECT_SCORE_BONUS, POINTS_PER_CORRECT, POINTS_PER_LEVEL},
    error::AppError,
    models::{
        session::{QuizSession, SessionStatus},
        user::UserProfile,
    },
    store::{QuizStore, StoreError},
};

pub fn level_for(points: i64) -> i32 {
    (points.max(0) / POINTS_PER_LEVEL + 1) as i32
}

pub fn points_for(correct: usize, total: usize) -> i64 {
    let mut points = correct as i64 * POINTS_PER_CORRECT;
    if total > 0 && correct == total {
        points += PERFECT_SCORE_BONUS;
    }
    points
}

/// Folds a completed session into the profile's gamification fields.
/// Sessions in any other state leave the profile untouched.
pub fn apply_completed_session(profile: &mut UserProfile, session: &QuizSession, now: DateTime<Utc>) {
    if session.status != SessionStatus::Completed {
        return;
    }

    let total = session.total_questions();
    let correct = session
        .correct_count
        .map(|c| c.max(0) as usize)
        .unwrap_or_else(|| session.count_correct());

    profile.points += points_for(correct, total);
    profile.level = level_for(profile.points);
    profile.quizzes_completed += 1;
    profile.questions_answered += session.answered_count() as i64;
    profile.correct_answers += correct as i64;

    let study_day = session.ended_at.unwrap_or(now).date_naive();
    profile.current_streak = match profile.last_study_date {
        Some(last) if last == study_day => profile.current_streak.max(1),
        Some(last) if last.succ_opt() == Some(study_day) => profile.current_streak + 1,
        Some(last) if last > study_day => profile.current_streak.max(1),
        _ => 1,
    };
    if profile.last_study_date.is_none_or(|last| last < study_day) {
        profile.last_study_date = Some(study_day);
    }
    profile.longest_streak = profile.longest_streak.max(profile.current_streak);
    profile.updated_at = now;
}

/// Applies a completed session to its owner's profile, retrying once when
/// another request saved the profile in between.
pub async fn record_completion(
    store: &dyn QuizStore,
    session: &QuizSession,
    now: DateTime<Utc>,
) -> Result<UserProfile, AppError> {
    let fallback_name = format!("user-{}", session.user_id);
    let mut attempt = 0;
    loop {
        let mut profile = store
            .get_or_create_profile(session.user_id, &fallback_name, now)
            .await?;
        apply_completed_session(&mut profile, session, now);

        match store.save_profile(profile).await {
            Ok(saved) => {
                tracing::info!(
                    user_id = saved.id,
                    session_id = session.id,
                    points = saved.points,
                    level = saved.level,
                    streak = saved.current_streak,
                    "Profile stats updated"
                );
                return Ok(saved);
            }
            Err(StoreError::VersionConflict) if attempt == 0 => {
                attempt += 1;
                tracing::debug!(user_id = session.user_id, "Profile changed concurrently, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
}
