// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

/// Number of questions in a quick quiz.
pub const QUICK_QUESTION_COUNT: usize = 10;

/// Number of questions in a timed quiz.
pub const TIMED_QUESTION_COUNT: usize = 20;

/// Time budget per question in timed mode (USMLE block pace).
pub const TIMED_SECONDS_PER_QUESTION: i64 = 90;

/// Upper bound for custom quizzes.
pub const MAX_CUSTOM_QUESTION_COUNT: usize = 50;

/// Points awarded per correct answer.
pub const POINTS_PER_CORRECT: i64 = 10;

/// Bonus for a 100% session.
pub const PERFECT_SCORE_BONUS: i64 = 50;

/// Points needed to advance one level.
pub const POINTS_PER_LEVEL: i64 = 500;

/// Size of the "recent" and "previous" windows used for the score trend.
pub const TREND_WINDOW: usize = 5;

/// How many times a client may re-attempt a failed operation per error event.
pub const MAX_RECOVERY_ATTEMPTS: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub rust_log: String,
    pub port: u16,
    pub analytics_history_limit: usize,
    pub error_log_capacity: usize,
    pub session_idle_timeout_secs: i64,
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            port: parse_var("PORT", 3000)?,
            analytics_history_limit: parse_var("ANALYTICS_HISTORY_LIMIT", 30)?,
            error_log_capacity: parse_var("ERROR_LOG_CAPACITY", 50)?,
            session_idle_timeout_secs: parse_var("SESSION_IDLE_TIMEOUT_SECS", 7200)?,
            sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", 60)?,
        })
    }

    /// Configuration for tests and local tooling: in-memory store, default limits.
    pub fn with_secret(jwt_secret: &str) -> Self {
        Self {
            database_url: None,
            jwt_secret: jwt_secret.to_string(),
            rust_log: "error".to_string(),
            port: 0,
            analytics_history_limit: 30,
            error_log_capacity: 50,
            session_idle_timeout_secs: 7200,
            sweep_interval_secs: 60,
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}
