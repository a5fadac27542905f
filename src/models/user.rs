// src/models/user.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::{MAX_CUSTOM_QUESTION_COUNT, QUICK_QUESTION_COUNT};
use crate::models::{question::Difficulty, session::QuizMode};

/// Represents the 'user_profiles' table.
/// The id is the subject of the identity provider's token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub display_name: String,

    // Gamification
    pub points: i64,
    pub level: i32,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_study_date: Option<chrono::NaiveDate>,

    // Lifetime totals
    pub quizzes_completed: i64,
    pub questions_answered: i64,
    pub correct_answers: i64,

    pub preferences: StudyPreferences,

    #[serde(skip)]
    pub version: i32,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl UserProfile {
    pub fn new(id: i64, display_name: String, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            id,
            display_name,
            points: 0,
            level: 1,
            current_streak: 0,
            longest_streak: 0,
            last_study_date: None,
            quizzes_completed: 0,
            questions_answered: 0,
            correct_answers: 0,
            preferences: StudyPreferences::default(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Lifetime accuracy in percent, one decimal.
    pub fn accuracy(&self) -> f64 {
        if self.questions_answered == 0 {
            return 0.0;
        }
        let raw = self.correct_answers as f64 * 100.0 / self.questions_answered as f64;
        (raw * 10.0).round() / 10.0
    }
}

/// Study preferences, stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct StudyPreferences {
    pub default_mode: QuizMode,
    #[validate(range(min = 1, max = MAX_CUSTOM_QUESTION_COUNT))]
    pub question_count: usize,
    #[validate(length(max = 20))]
    #[serde(default)]
    pub preferred_categories: Vec<String>,
    pub preferred_difficulty: Option<Difficulty>,
}

impl Default for StudyPreferences {
    fn default() -> Self {
        Self {
            default_mode: QuizMode::Quick,
            question_count: QUICK_QUESTION_COUNT,
            preferred_categories: Vec::new(),
            preferred_difficulty: None,
        }
    }
}

/// Aggregated profile data for the current user.
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub accuracy: f64,
    pub rank: Option<usize>,
}

/// Leaderboard row.
#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: i64,
    pub display_name: String,
    pub points: i64,
    pub level: i32,
    pub current_streak: i32,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    /// Number of rows (default: 10, max: 100).
    pub limit: Option<i64>,
}
