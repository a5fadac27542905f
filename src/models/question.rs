// src/models/question.rs

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use crate::{error::AppError, utils::html::clean_html};

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]{1,32}$").expect("tag pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// Content workflow state of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Draft,
    Review,
    Published,
    Archived,
}

impl QuestionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionStatus::Draft => "draft",
            QuestionStatus::Review => "review",
            QuestionStatus::Published => "published",
            QuestionStatus::Archived => "archived",
        }
    }

    pub fn can_transition_to(self, next: QuestionStatus) -> bool {
        use QuestionStatus::*;
        matches!(
            (self, next),
            (Draft, Review) | (Review, Draft) | (Review, Published) | (Published, Archived) | (Archived, Draft)
        )
    }
}

impl FromStr for QuestionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(QuestionStatus::Draft),
            "review" => Ok(QuestionStatus::Review),
            "published" => Ok(QuestionStatus::Published),
            "archived" => Ok(QuestionStatus::Archived),
            other => Err(format!("unknown question status '{other}'")),
        }
    }
}

/// Represents the 'questions' table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// The clinical vignette or stem.
    pub prompt: String,

    /// Answer choices, in display order.
    pub options: Vec<String>,

    /// Index into `options` of the correct choice.
    pub correct_answer: i32,

    pub explanation: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub reference_url: Option<String>,
    pub status: QuestionStatus,

    /// Incremented on every edit.
    pub version: i32,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Question {
    pub fn to_public(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.id,
            prompt: self.prompt.clone(),
            options: self.options.clone(),
            category: self.category.clone(),
            difficulty: self.difficulty,
            tags: self.tags.clone(),
        }
    }

    /// Moves the question along the content workflow.
    pub fn transition(&mut self, next: QuestionStatus, now: chrono::DateTime<chrono::Utc>) -> Result<(), AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::BadRequest(format!(
                "Cannot move question from {} to {}",
                self.status.as_str(),
                next.as_str()
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Replaces the content with an edit and bumps the version.
    pub fn apply_edit(&mut self, edit: QuestionInput, now: chrono::DateTime<chrono::Utc>) {
        self.prompt = edit.prompt;
        self.options = edit.options;
        self.correct_answer = edit.correct_answer;
        self.explanation = edit.explanation;
        self.category = edit.category;
        self.difficulty = edit.difficulty;
        self.tags = edit.tags;
        self.reference_url = edit.reference_url;
        self.version += 1;
        self.updated_at = now;
    }
}

/// DTO for sending a question to a quiz taker (no answer, no explanation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub prompt: String,
    pub options: Vec<String>,
    pub category: String,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
}

/// A question shown after its session ended, with the answer key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewedQuestion {
    #[serde(flatten)]
    pub question: PublicQuestion,
    pub correct_answer: i32,
    pub explanation: String,
    pub reference_url: Option<String>,
}

/// DTO for creating or editing a question.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuestionInput {
    #[validate(length(min = 1, max = 4000))]
    pub prompt: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    pub correct_answer: i32,
    #[validate(length(max = 8000))]
    #[serde(default)]
    pub explanation: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    pub difficulty: Difficulty,
    #[validate(custom(function = validate_tags))]
    #[serde(default)]
    pub tags: Vec<String>,
    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub reference_url: Option<String>,
}

impl QuestionInput {
    /// Runs field validation plus the cross-field answer index check.
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;
        if self.correct_answer < 0 || self.correct_answer as usize >= self.options.len() {
            return Err(AppError::BadRequest(format!(
                "correct_answer must be between 0 and {}",
                self.options.len().saturating_sub(1)
            )));
        }
        Ok(())
    }

    /// Sanitizes, then validates what will actually be stored.
    pub fn into_clean(self) -> Result<Self, AppError> {
        let input = self.sanitized();
        input.check()?;
        Ok(input)
    }

    /// Strips unsafe markup from every user-visible text field.
    pub fn sanitized(self) -> Self {
        Self {
            prompt: clean_html(&self.prompt).trim().to_string(),
            options: self.options.iter().map(|o| clean_html(o)).collect(),
            explanation: clean_html(&self.explanation),
            category: self.category.trim().to_string(),
            ..self
        }
    }
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 || options.len() > 8 {
        return Err(validator::ValidationError::new("options_count_out_of_range"));
    }
    for opt in options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_empty"));
        }
        if opt.len() > 1000 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<(), validator::ValidationError> {
    if tags.len() > 10 {
        return Err(validator::ValidationError::new("too_many_tags"));
    }
    if tags.iter().any(|t| !TAG_PATTERN.is_match(t)) {
        return Err(validator::ValidationError::new("invalid_tag"));
    }
    Ok(())
}

fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}

/// Query parameters for listing questions.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QuestionFilter {
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub status: Option<QuestionStatus>,
    /// Number of items to return (default: 50, max: 200).
    pub limit: Option<i64>,
}

impl QuestionFilter {
    pub fn matches(&self, question: &Question) -> bool {
        self.category.as_deref().is_none_or(|c| question.category == c)
            && self.difficulty.is_none_or(|d| question.difficulty == d)
            && self.status.is_none_or(|s| question.status == s)
    }

    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 200)
    }
}

/// DTO for a workflow transition.
#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: QuestionStatus,
}
