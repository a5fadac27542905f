// src/store/mod.rs

//! Persistence seam. Handlers and services only see [`QuizStore`]; the
//! PostgreSQL and in-memory backends are interchangeable behind it.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    question::{Question, QuestionFilter, QuestionInput},
    session::{QuizSession, SessionStatus},
    user::UserProfile,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("record not found")]
    NotFound,

    /// The row changed since it was loaded.
    #[error("version conflict")]
    VersionConflict,

    /// A stored row could not be mapped back into a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait QuizStore: Send + Sync {
    // Questions

    async fn insert_question(&self, input: QuestionInput, now: DateTime<Utc>) -> StoreResult<Question>;

    async fn get_question(&self, id: i64) -> StoreResult<Option<Question>>;

    /// Overwrites content, status and version of an existing question.
    async fn update_question(&self, question: &Question) -> StoreResult<()>;

    async fn list_questions(&self, filter: &QuestionFilter) -> StoreResult<Vec<Question>>;

    /// Random sample of published questions matching the filter.
    async fn pick_questions(&self, filter: &QuestionFilter, count: usize) -> StoreResult<Vec<Question>>;

    // Sessions

    /// Persists a new session, returning it with `id` and `version` assigned.
    async fn insert_session(&self, session: QuizSession) -> StoreResult<QuizSession>;

    async fn get_session(&self, id: i64) -> StoreResult<Option<QuizSession>>;

    /// Saves if the stored version still equals `session.version`.
    /// Returns the session with its new version, or `VersionConflict`.
    async fn save_session(&self, session: QuizSession) -> StoreResult<QuizSession>;

    /// Newest first.
    async fn list_sessions(
        &self,
        user_id: i64,
        status: Option<SessionStatus>,
        limit: i64,
    ) -> StoreResult<Vec<QuizSession>>;

    /// Active sessions last touched before `idle_before`.
    async fn stale_sessions(&self, idle_before: DateTime<Utc>) -> StoreResult<Vec<QuizSession>>;

    // Profiles

    async fn get_or_create_profile(
        &self,
        user_id: i64,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<UserProfile>;

    /// Same optimistic contract as `save_session`.
    async fn save_profile(&self, profile: UserProfile) -> StoreResult<UserProfile>;

    /// Ordered by points desc, level desc, id asc.
    async fn leaderboard(&self, limit: i64) -> StoreResult<Vec<UserProfile>>;

    /// 1-based position on the leaderboard.
    async fn rank_of(&self, user_id: i64) -> StoreResult<Option<usize>>;
}
