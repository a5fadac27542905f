// src/store/postgres.rs

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, postgres::PgPoolOptions, types::Json};

use super::{QuizStore, StoreError, StoreResult};
use crate::models::{
    question::{Question, QuestionFilter, QuestionInput},
    session::{QuizSession, SessionItem, SessionStatus},
    user::{StudyPreferences, UserProfile},
};

const QUESTION_COLUMNS: &str = "id, prompt, options, correct_answer, explanation, category, \
     difficulty, tags, reference_url, status, version, created_at, updated_at";

const SESSION_COLUMNS: &str = "id, user_id, mode, items, answers, status, score, correct_count, \
     elapsed_secs, time_limit_secs, paused_at, paused_secs, version, started_at, updated_at, ended_at";

const PROFILE_COLUMNS: &str = "id, display_name, points, level, current_streak, longest_streak, \
     last_study_date, quizzes_completed, questions_answered, correct_answers, preferences, version, \
     created_at, updated_at";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects with retry; the database container often starts after us.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let mut retry_count = 0;
        let pool = loop {
            match PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(3))
                .connect(database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) => {
                    retry_count += 1;
                    if retry_count > 5 {
                        return Err(StoreError::Database(e));
                    }
                    tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        };
        tracing::info!("Database connected...");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        tracing::info!("Running migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Migrations applied successfully.");
        Ok(())
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    prompt: String,
    options: Json<Vec<String>>,
    correct_answer: i32,
    explanation: String,
    category: String,
    difficulty: String,
    tags: Json<Vec<String>>,
    reference_url: Option<String>,
    status: String,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = StoreError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Question {
            id: row.id,
            prompt: row.prompt,
            options: row.options.0,
            correct_answer: row.correct_answer,
            explanation: row.explanation,
            category: row.category,
            difficulty: row.difficulty.parse().map_err(StoreError::Corrupt)?,
            tags: row.tags.0,
            reference_url: row.reference_url,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: i64,
    user_id: i64,
    mode: String,
    items: Json<Vec<SessionItem>>,
    answers: Json<Vec<Option<i32>>>,
    status: String,
    score: Option<i32>,
    correct_count: Option<i32>,
    elapsed_secs: Option<i64>,
    time_limit_secs: Option<i64>,
    paused_at: Option<DateTime<Utc>>,
    paused_secs: i64,
    version: i32,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl TryFrom<SessionRow> for QuizSession {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        if row.items.0.len() != row.answers.0.len() {
            return Err(StoreError::Corrupt(format!(
                "session {} has {} questions but {} answer slots",
                row.id,
                row.items.0.len(),
                row.answers.0.len()
            )));
        }
        Ok(QuizSession {
            id: row.id,
            user_id: row.user_id,
            mode: row.mode.parse().map_err(StoreError::Corrupt)?,
            items: row.items.0,
            answers: row.answers.0,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            score: row.score,
            correct_count: row.correct_count,
            elapsed_secs: row.elapsed_secs,
            time_limit_secs: row.time_limit_secs,
            paused_at: row.paused_at,
            paused_secs: row.paused_secs,
            version: row.version,
            started_at: row.started_at,
            updated_at: row.updated_at,
            ended_at: row.ended_at,
        })
    }
}

#[derive(FromRow)]
struct ProfileRow {
    id: i64,
    display_name: String,
    points: i64,
    level: i32,
    current_streak: i32,
    longest_streak: i32,
    last_study_date: Option<NaiveDate>,
    quizzes_completed: i64,
    questions_answered: i64,
    correct_answers: i64,
    preferences: Json<StudyPreferences>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        UserProfile {
            id: row.id,
            display_name: row.display_name,
            points: row.points,
            level: row.level,
            current_streak: row.current_streak,
            longest_streak: row.longest_streak,
            last_study_date: row.last_study_date,
            quizzes_completed: row.quizzes_completed,
            questions_answered: row.questions_answered,
            correct_answers: row.correct_answers,
            preferences: row.preferences.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn into_questions(rows: Vec<QuestionRow>) -> StoreResult<Vec<Question>> {
    rows.into_iter().map(Question::try_from).collect()
}

fn into_sessions(rows: Vec<SessionRow>) -> StoreResult<Vec<QuizSession>> {
    rows.into_iter().map(QuizSession::try_from).collect()
}

#[async_trait]
impl QuizStore for PgStore {
    async fn insert_question(&self, input: QuestionInput, now: DateTime<Utc>) -> StoreResult<Question> {
        let row: QuestionRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO questions
                (prompt, options, correct_answer, explanation, category, difficulty, tags, reference_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(&input.prompt)
        .bind(Json(&input.options))
        .bind(input.correct_answer)
        .bind(&input.explanation)
        .bind(&input.category)
        .bind(input.difficulty.as_str())
        .bind(Json(&input.tags))
        .bind(&input.reference_url)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_question(&self, id: i64) -> StoreResult<Option<Question>> {
        let row: Option<QuestionRow> =
            sqlx::query_as(&format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Question::try_from).transpose()
    }

    async fn update_question(&self, question: &Question) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE questions SET
                prompt = $2, options = $3, correct_answer = $4, explanation = $5,
                category = $6, difficulty = $7, tags = $8, reference_url = $9,
                status = $10, version = $11, updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(question.id)
        .bind(&question.prompt)
        .bind(Json(&question.options))
        .bind(question.correct_answer)
        .bind(&question.explanation)
        .bind(&question.category)
        .bind(question.difficulty.as_str())
        .bind(Json(&question.tags))
        .bind(&question.reference_url)
        .bind(question.status.as_str())
        .bind(question.version)
        .bind(question.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_questions(&self, filter: &QuestionFilter) -> StoreResult<Vec<Question>> {
        let rows: Vec<QuestionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {QUESTION_COLUMNS}
            FROM questions
            WHERE ($1::TEXT IS NULL OR category = $1)
              AND ($2::TEXT IS NULL OR difficulty = $2)
              AND ($3::TEXT IS NULL OR status = $3)
            ORDER BY id
            LIMIT $4
            "#
        ))
        .bind(filter.category.as_deref())
        .bind(filter.difficulty.map(|d| d.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.effective_limit())
        .fetch_all(&self.pool)
        .await?;

        into_questions(rows)
    }

    async fn pick_questions(&self, filter: &QuestionFilter, count: usize) -> StoreResult<Vec<Question>> {
        let rows: Vec<QuestionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {QUESTION_COLUMNS}
            FROM questions
            WHERE status = 'published'
              AND ($1::TEXT IS NULL OR category = $1)
              AND ($2::TEXT IS NULL OR difficulty = $2)
            ORDER BY RANDOM()
            LIMIT $3
            "#
        ))
        .bind(filter.category.as_deref())
        .bind(filter.difficulty.map(|d| d.as_str()))
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await?;

        into_questions(rows)
    }

    async fn insert_session(&self, session: QuizSession) -> StoreResult<QuizSession> {
        let row: SessionRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO quiz_sessions
                (user_id, mode, items, answers, status, time_limit_secs, paused_secs, started_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(session.user_id)
        .bind(session.mode.as_str())
        .bind(Json(&session.items))
        .bind(Json(&session.answers))
        .bind(session.status.as_str())
        .bind(session.time_limit_secs)
        .bind(session.paused_secs)
        .bind(session.started_at)
        .bind(session.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_session(&self, id: i64) -> StoreResult<Option<QuizSession>> {
        let row: Option<SessionRow> =
            sqlx::query_as(&format!("SELECT {SESSION_COLUMNS} FROM quiz_sessions WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(QuizSession::try_from).transpose()
    }

    async fn save_session(&self, mut session: QuizSession) -> StoreResult<QuizSession> {
        let version: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE quiz_sessions SET
                answers = $3, status = $4, score = $5, correct_count = $6, elapsed_secs = $7,
                paused_at = $8, paused_secs = $9, updated_at = $10, ended_at = $11,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(session.id)
        .bind(session.version)
        .bind(Json(&session.answers))
        .bind(session.status.as_str())
        .bind(session.score)
        .bind(session.correct_count)
        .bind(session.elapsed_secs)
        .bind(session.paused_at)
        .bind(session.paused_secs)
        .bind(session.updated_at)
        .bind(session.ended_at)
        .fetch_optional(&self.pool)
        .await?;

        session.version = version.ok_or(StoreError::VersionConflict)?;
        Ok(session)
    }

    async fn list_sessions(
        &self,
        user_id: i64,
        status: Option<SessionStatus>,
        limit: i64,
    ) -> StoreResult<Vec<QuizSession>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM quiz_sessions
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY started_at DESC, id DESC
            LIMIT $3
            "#
        ))
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        into_sessions(rows)
    }

    async fn stale_sessions(&self, idle_before: DateTime<Utc>) -> StoreResult<Vec<QuizSession>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM quiz_sessions WHERE status = 'active' AND updated_at < $1"
        ))
        .bind(idle_before)
        .fetch_all(&self.pool)
        .await?;

        into_sessions(rows)
    }

    async fn get_or_create_profile(
        &self,
        user_id: i64,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<UserProfile> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (id, display_name, preferences, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(display_name)
        .bind(Json(StudyPreferences::default()))
        .bind(now)
        .execute(&self.pool)
        .await?;

        let row: ProfileRow =
            sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE id = $1"))
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(row.into())
    }

    async fn save_profile(&self, mut profile: UserProfile) -> StoreResult<UserProfile> {
        let version: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE user_profiles SET
                display_name = $3, points = $4, level = $5, current_streak = $6,
                longest_streak = $7, last_study_date = $8, quizzes_completed = $9,
                questions_answered = $10, correct_answers = $11, preferences = $12,
                updated_at = $13, version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(profile.id)
        .bind(profile.version)
        .bind(&profile.display_name)
        .bind(profile.points)
        .bind(profile.level)
        .bind(profile.current_streak)
        .bind(profile.longest_streak)
        .bind(profile.last_study_date)
        .bind(profile.quizzes_completed)
        .bind(profile.questions_answered)
        .bind(profile.correct_answers)
        .bind(Json(&profile.preferences))
        .bind(profile.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        profile.version = version.ok_or(StoreError::VersionConflict)?;
        Ok(profile)
    }

    async fn leaderboard(&self, limit: i64) -> StoreResult<Vec<UserProfile>> {
        let rows: Vec<ProfileRow> = sqlx::query_as(&format!(
            r#"
            SELECT {PROFILE_COLUMNS}
            FROM user_profiles
            ORDER BY points DESC, level DESC, id ASC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserProfile::from).collect())
    }

    async fn rank_of(&self, user_id: i64) -> StoreResult<Option<usize>> {
        let rank: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT ranked.position FROM (
                SELECT id, ROW_NUMBER() OVER (ORDER BY points DESC, level DESC, id ASC) AS position
                FROM user_profiles
            ) ranked
            WHERE ranked.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rank.map(|r| r as usize))
    }
}
