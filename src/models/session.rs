// src/models/session.rs

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::MAX_CUSTOM_QUESTION_COUNT;
use crate::models::question::{Difficulty, PublicQuestion, Question, ReviewedQuestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizMode {
    Quick,
    Timed,
    Custom,
}

impl QuizMode {
    pub fn as_str(self) -> &'static str {
        match self {
            QuizMode::Quick => "quick",
            QuizMode::Timed => "timed",
            QuizMode::Custom => "custom",
        }
    }
}

impl FromStr for QuizMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quick" => Ok(QuizMode::Quick),
            "timed" => Ok(QuizMode::Timed),
            "custom" => Ok(QuizMode::Custom),
            other => Err(format!("unknown quiz mode '{other}'")),
        }
    }
}

/// Lifecycle state. Only ever moves forward: active -> completed | abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != SessionStatus::Active
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            "abandoned" => Ok(SessionStatus::Abandoned),
            other => Err(format!("unknown session status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Session is {} and no longer accepts changes", .0.as_str())]
    NotActive(SessionStatus),

    #[error("Question index {index} is out of range (session has {total} questions)")]
    IndexOutOfRange { index: usize, total: usize },

    #[error("Option {option} is not valid for a question with {options} options")]
    OptionOutOfRange { option: i32, options: usize },

    #[error("Question {0} already has a different answer")]
    AlreadyAnswered(usize),

    #[error("The time budget for this session has expired")]
    TimeExpired,

    #[error("Session is already paused")]
    AlreadyPaused,

    #[error("Session is not paused")]
    NotPaused,
}

/// Snapshot of a question taken when the session starts. Grading and the
/// session views both read from it, so later edits to the question never
/// change what the user saw or how they were scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionItem {
    pub question_id: i64,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answer: i32,
    #[serde(default)]
    pub explanation: String,
    pub category: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
    pub reference_url: Option<String>,
}

impl SessionItem {
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    pub fn is_correct(&self, answer: Option<i32>) -> bool {
        answer == Some(self.correct_answer)
    }

    pub fn to_public(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.question_id,
            prompt: self.prompt.clone(),
            options: self.options.clone(),
            category: self.category.clone(),
            difficulty: self.difficulty,
            tags: self.tags.clone(),
        }
    }

    pub fn to_reviewed(&self) -> ReviewedQuestion {
        ReviewedQuestion {
            question: self.to_public(),
            correct_answer: self.correct_answer,
            explanation: self.explanation.clone(),
            reference_url: self.reference_url.clone(),
        }
    }
}

#[cfg(test)]
impl SessionItem {
    /// Minimal snapshot for tests: options are "A", "B", ... .
    pub(crate) fn sample(
        question_id: i64,
        correct_answer: i32,
        options: usize,
        category: &str,
        difficulty: Difficulty,
    ) -> Self {
        SessionItem {
            question_id,
            prompt: format!("Question {}", question_id),
            options: (0..options).map(|i| char::from(b'A' + i as u8).to_string()).collect(),
            correct_answer,
            explanation: String::new(),
            category: category.to_string(),
            difficulty,
            tags: Vec::new(),
            reference_url: None,
        }
    }
}

impl From<&Question> for SessionItem {
    fn from(question: &Question) -> Self {
        SessionItem {
            question_id: question.id,
            prompt: question.prompt.clone(),
            options: question.options.clone(),
            correct_answer: question.correct_answer,
            explanation: question.explanation.clone(),
            category: question.category.clone(),
            difficulty: question.difficulty,
            tags: question.tags.clone(),
            reference_url: question.reference_url.clone(),
        }
    }
}

/// One attempt at a set of questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSession {
    pub id: i64,
    pub user_id: i64,
    pub mode: QuizMode,
    pub items: Vec<SessionItem>,
    /// Parallel to `items`; `None` until answered.
    pub answers: Vec<Option<i32>>,
    pub status: SessionStatus,
    /// Frozen when the session reaches a terminal state.
    pub score: Option<i32>,
    pub correct_count: Option<i32>,
    pub elapsed_secs: Option<i64>,
    pub time_limit_secs: Option<i64>,
    pub paused_at: Option<DateTime<Utc>>,
    pub paused_secs: i64,
    /// Optimistic concurrency token, bumped by the store on every save.
    pub version: i32,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Result of a single answer submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOutcome {
    pub index: usize,
    pub answer: i32,
    /// The identical answer had already been recorded.
    pub duplicate: bool,
    pub status: SessionStatus,
    pub answered_count: usize,
    pub total_questions: usize,
    /// Set once the answer completed the session.
    pub score: Option<i32>,
}

/// Percentage of correct answers, rounded half up.
pub fn score_percentage(correct: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    ((correct * 200 + total) / (2 * total)) as i32
}

impl QuizSession {
    /// Builds an unsaved active session. The store assigns `id` and `version`.
    pub fn new(
        user_id: i64,
        mode: QuizMode,
        items: Vec<SessionItem>,
        time_limit_secs: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        let answers = vec![None; items.len()];
        Self {
            id: 0,
            user_id,
            mode,
            items,
            answers,
            status: SessionStatus::Active,
            score: None,
            correct_count: None,
            elapsed_secs: None,
            time_limit_secs,
            paused_at: None,
            paused_secs: 0,
            version: 0,
            started_at: now,
            updated_at: now,
            ended_at: None,
        }
    }

    pub fn total_questions(&self) -> usize {
        self.items.len()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    pub fn all_answered(&self) -> bool {
        self.answers.iter().all(Option::is_some)
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Answers matching the snapshot answer key. Unanswered counts as wrong.
    pub fn count_correct(&self) -> usize {
        self.items
            .iter()
            .zip(&self.answers)
            .filter(|(item, answer)| item.is_correct(**answer))
            .count()
    }

    /// Wall-clock time since start minus paused time, never negative.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> i64 {
        if let Some(frozen) = self.elapsed_secs {
            return frozen;
        }
        let mut paused = self.paused_secs;
        if let Some(since) = self.paused_at {
            paused += (now - since).num_seconds().max(0);
        }
        ((now - self.started_at).num_seconds() - paused).max(0)
    }

    pub fn remaining_at(&self, now: DateTime<Utc>) -> Option<i64> {
        self.time_limit_secs
            .map(|limit| (limit - self.elapsed_at(now)).max(0))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.time_limit_secs
            .is_some_and(|limit| self.elapsed_at(now) >= limit)
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.status.is_terminal() {
            return Err(SessionError::NotActive(self.status));
        }
        Ok(())
    }

    /// Like `ensure_active`, but a session whose budget ran out is completed
    /// on the spot and the caller gets `TimeExpired`.
    fn ensure_running(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_active()?;
        if self.expire_if_due(now) {
            return Err(SessionError::TimeExpired);
        }
        Ok(())
    }

    /// Completes an active session whose time budget ran out.
    /// Returns true when the session changed state.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == SessionStatus::Active && self.is_expired(now) {
            self.close(SessionStatus::Completed, now);
            return true;
        }
        false
    }

    /// Records an answer. Completes the session when it was the last open question.
    pub fn submit_answer(
        &mut self,
        index: usize,
        answer: i32,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome, SessionError> {
        self.ensure_running(now)?;

        let total = self.items.len();
        let item = self
            .items
            .get(index)
            .ok_or(SessionError::IndexOutOfRange { index, total })?;

        let options = item.option_count();
        if answer < 0 || answer as usize >= options {
            return Err(SessionError::OptionOutOfRange { option: answer, options });
        }

        let duplicate = match self.answers[index] {
            Some(existing) if existing == answer => true,
            Some(_) => return Err(SessionError::AlreadyAnswered(index)),
            None => false,
        };

        if !duplicate {
            // Answering implies the user is back.
            if self.paused_at.is_some() {
                self.fold_pause(now);
            }
            self.answers[index] = Some(answer);
            self.updated_at = now;
            if self.all_answered() {
                self.close(SessionStatus::Completed, now);
            }
        }

        Ok(AnswerOutcome {
            index,
            answer,
            duplicate,
            status: self.status,
            answered_count: self.answered_count(),
            total_questions: total,
            score: self.score,
        })
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_running(now)?;
        if self.paused_at.is_some() {
            return Err(SessionError::AlreadyPaused);
        }
        self.paused_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_running(now)?;
        if self.paused_at.is_none() {
            return Err(SessionError::NotPaused);
        }
        self.fold_pause(now);
        self.updated_at = now;
        Ok(())
    }

    /// Ends the session: completed when everything is answered or time ran out,
    /// abandoned otherwise.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<SessionStatus, SessionError> {
        self.ensure_active()?;
        let status = if self.all_answered() || self.is_expired(now) {
            SessionStatus::Completed
        } else {
            SessionStatus::Abandoned
        };
        self.close(status, now);
        Ok(status)
    }

    /// Abandons the session. One whose budget already ran out is completed instead.
    pub fn abandon(&mut self, now: DateTime<Utc>) -> Result<SessionStatus, SessionError> {
        self.ensure_active()?;
        if self.expire_if_due(now) {
            return Ok(SessionStatus::Completed);
        }
        self.close(SessionStatus::Abandoned, now);
        Ok(SessionStatus::Abandoned)
    }

    fn fold_pause(&mut self, now: DateTime<Utc>) {
        if let Some(since) = self.paused_at.take() {
            self.paused_secs += (now - since).num_seconds().max(0);
        }
    }

    fn close(&mut self, status: SessionStatus, now: DateTime<Utc>) {
        self.fold_pause(now);
        let mut elapsed = self.elapsed_at(now);
        if let Some(limit) = self.time_limit_secs {
            elapsed = elapsed.min(limit);
        }
        let correct = self.count_correct();
        self.elapsed_secs = Some(elapsed);
        self.correct_count = Some(correct as i32);
        self.score = Some(score_percentage(correct, self.items.len()));
        self.status = status;
        self.ended_at = Some(now);
        self.updated_at = now;
    }

    pub fn summary(&self, now: DateTime<Utc>) -> SessionSummary {
        SessionSummary {
            id: self.id,
            mode: self.mode,
            status: self.status,
            total_questions: self.total_questions(),
            answered_count: self.answered_count(),
            score: self.score,
            correct_count: self.correct_count,
            elapsed_secs: self.elapsed_at(now),
            time_limit_secs: self.time_limit_secs,
            remaining_secs: if self.status.is_terminal() { None } else { self.remaining_at(now) },
            paused: self.is_paused(),
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

/// DTO for starting a session.
#[derive(Debug, Deserialize, Validate)]
pub struct StartSessionRequest {
    pub mode: QuizMode,
    /// Required for custom mode, ignored otherwise.
    #[validate(range(min = 1, max = MAX_CUSTOM_QUESTION_COUNT))]
    pub question_count: Option<usize>,
    /// Custom mode only.
    #[validate(range(min = 60, max = 14400))]
    pub time_limit_secs: Option<i64>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
}

/// DTO for answering one question.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    /// Position of the question within the session.
    pub index: usize,
    /// Selected option index.
    pub answer: i32,
}

/// Query parameters for listing a user's sessions.
#[derive(Debug, Deserialize)]
pub struct SessionListParams {
    pub status: Option<SessionStatus>,
    /// Number of items to return (default: 20, max: 100).
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: i64,
    pub mode: QuizMode,
    pub status: SessionStatus,
    pub total_questions: usize,
    pub answered_count: usize,
    pub score: Option<i32>,
    pub correct_count: Option<i32>,
    pub elapsed_secs: i64,
    pub time_limit_secs: Option<i64>,
    pub remaining_secs: Option<i64>,
    pub paused: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A question as shown inside a session: without the key while active,
/// with the key and explanation once the session has ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionQuestion {
    Reviewed(ReviewedQuestion),
    Open(PublicQuestion),
}

/// Full session view including questions and answers.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub answers: Vec<Option<i32>>,
    pub questions: Vec<SessionQuestion>,
}
