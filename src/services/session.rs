// src/services/session.rs

use chrono::{DateTime, Duration, Utc};
use validator::Validate;

use crate::{
    config::{QUICK_QUESTION_COUNT, TIMED_QUESTION_COUNT, TIMED_SECONDS_PER_QUESTION},
    error::AppError,
    models::{
        question::QuestionFilter,
        session::{
            AnswerOutcome, QuizMode, QuizSession, SessionError, SessionItem, SessionListParams,
            SessionQuestion, SessionStatus, SessionSummary, SessionView, StartSessionRequest,
            SubmitAnswerRequest,
        },
    },
    services::stats,
    store::{QuizStore, StoreError},
};

/// Creates a session from a random draw of published questions.
pub async fn start_session(
    store: &dyn QuizStore,
    user_id: i64,
    display_name: &str,
    req: StartSessionRequest,
    now: DateTime<Utc>,
) -> Result<SessionView, AppError> {
    req.validate()?;

    let requested = match req.mode {
        QuizMode::Quick => QUICK_QUESTION_COUNT,
        QuizMode::Timed => TIMED_QUESTION_COUNT,
        QuizMode::Custom => req.question_count.ok_or(AppError::BadRequest(
            "question_count is required for custom quizzes".to_string(),
        ))?,
    };

    // Sessions reference the profile, so it has to exist first.
    store.get_or_create_profile(user_id, display_name, now).await?;

    let filter = QuestionFilter {
        category: req.category,
        difficulty: req.difficulty,
        ..Default::default()
    };
    let questions = store.pick_questions(&filter, requested).await?;
    if questions.is_empty() {
        return Err(AppError::BadRequest(
            "No published questions match the requested filters".to_string(),
        ));
    }

    let time_limit_secs = match req.mode {
        QuizMode::Quick => None,
        QuizMode::Timed => Some(questions.len() as i64 * TIMED_SECONDS_PER_QUESTION),
        QuizMode::Custom => req.time_limit_secs,
    };

    let items: Vec<SessionItem> = questions.iter().map(SessionItem::from).collect();
    let session = store
        .insert_session(QuizSession::new(user_id, req.mode, items, time_limit_secs, now))
        .await?;

    tracing::info!(
        session_id = session.id,
        user_id,
        mode = session.mode.as_str(),
        questions = session.total_questions(),
        requested,
        "Quiz session started"
    );

    Ok(build_view(&session, now))
}

/// Loads a session, hiding other users' sessions behind a 404.
async fn load_owned(
    store: &dyn QuizStore,
    session_id: i64,
    owner: Option<i64>,
) -> Result<QuizSession, AppError> {
    let session = store
        .get_session(session_id)
        .await?
        .ok_or(AppError::NotFound("Session not found".to_string()))?;

    if owner.is_some_and(|user_id| user_id != session.user_id) {
        return Err(AppError::NotFound("Session not found".to_string()));
    }
    Ok(session)
}

/// Load, apply `op`, save. A concurrent save is answered by reloading and
/// applying `op` once more. An error from `op` is still persisted when the
/// operation moved the session to a terminal state (time ran out).
async fn mutate<T, F>(
    store: &dyn QuizStore,
    session_id: i64,
    owner: Option<i64>,
    now: DateTime<Utc>,
    op: F,
) -> Result<(QuizSession, T), AppError>
where
    F: Fn(&mut QuizSession) -> Result<T, SessionError>,
{
    let mut attempt = 0;
    loop {
        let mut session = load_owned(store, session_id, owner).await?;
        let before = session.status;
        let outcome = op(&mut session);

        if outcome.is_err() && session.status == before {
            return outcome.map(|v| (session, v)).map_err(AppError::from);
        }

        match store.save_session(session).await {
            Ok(saved) => {
                after_transition(store, before, &saved, now).await;
                return outcome.map(|v| (saved, v)).map_err(AppError::from);
            }
            Err(StoreError::VersionConflict) if attempt == 0 => {
                attempt += 1;
                tracing::debug!(session_id, "Session changed concurrently, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Side effects of a state change that was just persisted.
async fn after_transition(
    store: &dyn QuizStore,
    before: SessionStatus,
    session: &QuizSession,
    now: DateTime<Utc>,
) {
    if before == session.status {
        return;
    }

    tracing::info!(
        session_id = session.id,
        user_id = session.user_id,
        status = session.status.as_str(),
        score = ?session.score,
        "Quiz session closed"
    );

    if session.status == SessionStatus::Completed {
        // The session row is already final; a failed stats write must not undo it.
        if let Err(e) = stats::record_completion(store, session, now).await {
            tracing::error!(session_id = session.id, "Failed to update profile stats: {}", e);
        }
    }
}

/// Renders the session from its own snapshot; answer keys only once it has ended.
fn build_view(session: &QuizSession, now: DateTime<Utc>) -> SessionView {
    let reveal = session.status.is_terminal();
    let questions = session
        .items
        .iter()
        .map(|item| {
            if reveal {
                SessionQuestion::Reviewed(item.to_reviewed())
            } else {
                SessionQuestion::Open(item.to_public())
            }
        })
        .collect();

    SessionView {
        summary: session.summary(now),
        answers: session.answers.clone(),
        questions,
    }
}

/// Persists the completion of a session whose time budget ran out.
async fn close_if_expired(
    store: &dyn QuizStore,
    session: QuizSession,
    now: DateTime<Utc>,
) -> Result<QuizSession, AppError> {
    if session.status != SessionStatus::Active || !session.is_expired(now) {
        return Ok(session);
    }
    let (closed, _) = mutate(store, session.id, Some(session.user_id), now, |s| {
        s.expire_if_due(now);
        Ok(())
    })
    .await?;
    Ok(closed)
}

/// Full view of one session. A session whose time ran out is closed first.
pub async fn get_session(
    store: &dyn QuizStore,
    session_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<SessionView, AppError> {
    let session = load_owned(store, session_id, Some(user_id)).await?;
    let session = close_if_expired(store, session, now).await?;
    Ok(build_view(&session, now))
}

/// The user's sessions, newest first. Expired ones are closed before listing.
pub async fn list_sessions(
    store: &dyn QuizStore,
    user_id: i64,
    params: SessionListParams,
    now: DateTime<Utc>,
) -> Result<Vec<SessionSummary>, AppError> {
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let sessions = store.list_sessions(user_id, params.status, limit).await?;

    let mut summaries = Vec::with_capacity(sessions.len());
    for session in sessions {
        let session = close_if_expired(store, session, now).await?;
        if params.status.is_none_or(|status| status == session.status) {
            summaries.push(session.summary(now));
        }
    }
    Ok(summaries)
}

pub async fn submit_answer(
    store: &dyn QuizStore,
    session_id: i64,
    user_id: i64,
    req: SubmitAnswerRequest,
    now: DateTime<Utc>,
) -> Result<AnswerOutcome, AppError> {
    let (_, outcome) = mutate(store, session_id, Some(user_id), now, |s| {
        s.submit_answer(req.index, req.answer, now)
    })
    .await?;
    Ok(outcome)
}

pub async fn pause(
    store: &dyn QuizStore,
    session_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<SessionSummary, AppError> {
    let (session, _) = mutate(store, session_id, Some(user_id), now, |s| s.pause(now)).await?;
    Ok(session.summary(now))
}

pub async fn resume(
    store: &dyn QuizStore,
    session_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<SessionSummary, AppError> {
    let (session, _) = mutate(store, session_id, Some(user_id), now, |s| s.resume(now)).await?;
    Ok(session.summary(now))
}

/// Completed if everything is answered or time is up, abandoned otherwise.
pub async fn finish(
    store: &dyn QuizStore,
    session_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<SessionView, AppError> {
    let (session, _) = mutate(store, session_id, Some(user_id), now, |s| s.finish(now)).await?;
    Ok(build_view(&session, now))
}

pub async fn abandon(
    store: &dyn QuizStore,
    session_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<SessionSummary, AppError> {
    let (session, _) = mutate(store, session_id, Some(user_id), now, |s| s.abandon(now)).await?;
    Ok(session.summary(now))
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub completed: usize,
    pub abandoned: usize,
}

/// Closes active sessions nobody touched for `idle_timeout_secs`.
/// Sessions whose time budget is spent count as completed.
pub async fn sweep_stale_sessions(
    store: &dyn QuizStore,
    idle_timeout_secs: i64,
    now: DateTime<Utc>,
) -> Result<SweepReport, AppError> {
    let idle_before = now - Duration::seconds(idle_timeout_secs);
    let stale = store.stale_sessions(idle_before).await?;

    let mut report = SweepReport::default();
    for candidate in stale {
        match mutate(store, candidate.id, None, now, |s| s.abandon(now)).await {
            Ok((_, SessionStatus::Completed)) => report.completed += 1,
            Ok(_) => report.abandoned += 1,
            // Closed by its owner since the scan.
            Err(AppError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }

    if report != SweepReport::default() {
        tracing::info!(
            completed = report.completed,
            abandoned = report.abandoned,
            "Stale sessions swept"
        );
    }
    Ok(report)
}
