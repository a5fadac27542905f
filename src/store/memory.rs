// src/store/memory.rs

use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use tokio::sync::RwLock;

use super::{QuizStore, StoreError, StoreResult};
use crate::models::{
    question::{Question, QuestionFilter, QuestionInput, QuestionStatus},
    session::{QuizSession, SessionStatus},
    user::UserProfile,
};

#[derive(Default)]
struct Tables {
    questions: HashMap<i64, Question>,
    sessions: HashMap<i64, QuizSession>,
    profiles: HashMap<i64, UserProfile>,
    next_question_id: i64,
    next_session_id: i64,
}

/// Process-local store for development and tests. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn leaderboard_order(profiles: &mut [&UserProfile]) {
    profiles.sort_by_key(|p| (Reverse(p.points), Reverse(p.level), p.id));
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn insert_question(&self, input: QuestionInput, now: DateTime<Utc>) -> StoreResult<Question> {
        let mut tables = self.tables.write().await;
        tables.next_question_id += 1;
        let question = Question {
            id: tables.next_question_id,
            prompt: input.prompt,
            options: input.options,
            correct_answer: input.correct_answer,
            explanation: input.explanation,
            category: input.category,
            difficulty: input.difficulty,
            tags: input.tags,
            reference_url: input.reference_url,
            status: QuestionStatus::Draft,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        tables.questions.insert(question.id, question.clone());
        Ok(question)
    }

    async fn get_question(&self, id: i64) -> StoreResult<Option<Question>> {
        Ok(self.tables.read().await.questions.get(&id).cloned())
    }

    async fn update_question(&self, question: &Question) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.questions.get_mut(&question.id) {
            Some(slot) => {
                *slot = question.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn list_questions(&self, filter: &QuestionFilter) -> StoreResult<Vec<Question>> {
        let tables = self.tables.read().await;
        let mut list: Vec<Question> = tables
            .questions
            .values()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect();
        list.sort_by_key(|q| q.id);
        list.truncate(filter.effective_limit() as usize);
        Ok(list)
    }

    async fn pick_questions(&self, filter: &QuestionFilter, count: usize) -> StoreResult<Vec<Question>> {
        let tables = self.tables.read().await;
        let mut pool: Vec<&Question> = tables
            .questions
            .values()
            .filter(|q| q.status == QuestionStatus::Published && filter.matches(q))
            .collect();
        pool.shuffle(&mut rand::thread_rng());
        Ok(pool.into_iter().take(count).cloned().collect())
    }

    async fn insert_session(&self, mut session: QuizSession) -> StoreResult<QuizSession> {
        let mut tables = self.tables.write().await;
        tables.next_session_id += 1;
        session.id = tables.next_session_id;
        session.version = 1;
        tables.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: i64) -> StoreResult<Option<QuizSession>> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn save_session(&self, mut session: QuizSession) -> StoreResult<QuizSession> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .sessions
            .get_mut(&session.id)
            .ok_or(StoreError::NotFound)?;
        if stored.version != session.version {
            return Err(StoreError::VersionConflict);
        }
        session.version += 1;
        *stored = session.clone();
        Ok(session)
    }

    async fn list_sessions(
        &self,
        user_id: i64,
        status: Option<SessionStatus>,
        limit: i64,
    ) -> StoreResult<Vec<QuizSession>> {
        let tables = self.tables.read().await;
        let mut list: Vec<QuizSession> = tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && status.is_none_or(|st| s.status == st))
            .cloned()
            .collect();
        list.sort_by_key(|s| (Reverse(s.started_at), Reverse(s.id)));
        list.truncate(limit.max(0) as usize);
        Ok(list)
    }

    async fn stale_sessions(&self, idle_before: DateTime<Utc>) -> StoreResult<Vec<QuizSession>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .values()
            .filter(|s| s.status == SessionStatus::Active && s.updated_at < idle_before)
            .cloned()
            .collect())
    }

    async fn get_or_create_profile(
        &self,
        user_id: i64,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<UserProfile> {
        let mut tables = self.tables.write().await;
        let profile = tables.profiles.entry(user_id).or_insert_with(|| {
            let mut profile = UserProfile::new(user_id, display_name.to_string(), now);
            profile.version = 1;
            profile
        });
        Ok(profile.clone())
    }

    async fn save_profile(&self, mut profile: UserProfile) -> StoreResult<UserProfile> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .profiles
            .get_mut(&profile.id)
            .ok_or(StoreError::NotFound)?;
        if stored.version != profile.version {
            return Err(StoreError::VersionConflict);
        }
        profile.version += 1;
        *stored = profile.clone();
        Ok(profile)
    }

    async fn leaderboard(&self, limit: i64) -> StoreResult<Vec<UserProfile>> {
        let tables = self.tables.read().await;
        let mut profiles: Vec<&UserProfile> = tables.profiles.values().collect();
        leaderboard_order(&mut profiles);
        Ok(profiles
            .into_iter()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn rank_of(&self, user_id: i64) -> StoreResult<Option<usize>> {
        let tables = self.tables.read().await;
        let mut profiles: Vec<&UserProfile> = tables.profiles.values().collect();
        leaderboard_order(&mut profiles);
        Ok(profiles.iter().position(|p| p.id == user_id).map(|i| i + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{question::Difficulty, session::QuizMode};

    fn input(category: &str) -> QuestionInput {
        QuestionInput {
            prompt: "Prompt".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
            correct_answer: 1,
            explanation: String::new(),
            category: category.to_string(),
            difficulty: Difficulty::Easy,
            tags: vec![],
            reference_url: None,
        }
    }

    #[tokio::test]
    async fn pick_only_returns_published_matches() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for category in ["cardio", "cardio", "renal"] {
            let mut q = store.insert_question(input(category), now).await.unwrap();
            q.status = QuestionStatus::Published;
            store.update_question(&q).await.unwrap();
        }
        store.insert_question(input("cardio"), now).await.unwrap(); // draft

        let filter = QuestionFilter {
            category: Some("cardio".to_string()),
            ..Default::default()
        };
        let picked = store.pick_questions(&filter, 10).await.unwrap();
        assert_eq!(picked.len(), 2);
        assert!(picked.iter().all(|q| q.status == QuestionStatus::Published));
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = MemoryStore::new();
        let session = QuizSession::new(1, QuizMode::Quick, vec![], None, Utc::now());
        let saved = store.insert_session(session).await.unwrap();

        let first = store.save_session(saved.clone()).await.unwrap();
        assert_eq!(first.version, 2);
        assert!(matches!(
            store.save_session(saved).await,
            Err(StoreError::VersionConflict)
        ));
    }

    #[tokio::test]
    async fn leaderboard_breaks_ties_by_level_then_id() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (id, points, level) in [(3, 100, 1), (2, 100, 2), (1, 100, 1), (4, 500, 1)] {
            let mut p = store.get_or_create_profile(id, "u", now).await.unwrap();
            p.points = points;
            p.level = level;
            store.save_profile(p).await.unwrap();
        }
        let ids: Vec<i64> = store.leaderboard(10).await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![4, 2, 1, 3]);
        assert_eq!(store.rank_of(1).await.unwrap(), Some(3));
        assert_eq!(store.rank_of(99).await.unwrap(), None);
    }
}
