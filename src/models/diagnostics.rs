// src/models/diagnostics.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Coarse error taxonomy shared by server responses and client reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Network,
    Auth,
    Data,
    Render,
    Unknown,
}

impl ErrorCategory {
    /// The best-effort recovery a client should try for this kind of failure.
    pub fn recovery_action(self) -> RecoveryAction {
        match self {
            ErrorCategory::Network => RecoveryAction::Retry,
            ErrorCategory::Auth => RecoveryAction::Reauthenticate,
            ErrorCategory::Data => RecoveryAction::ResetLocalState,
            ErrorCategory::Render => RecoveryAction::ReloadView,
            ErrorCategory::Unknown => RecoveryAction::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Retry,
    Reauthenticate,
    ResetLocalState,
    ReloadView,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Degraded,
    Critical,
}

/// A client-side failure as reported by the client. Kept in memory only.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    /// Support correlation id.
    pub id: Uuid,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub message: String,
    pub context: Option<serde_json::Value>,
    pub recovered: bool,
    pub recovery_attempts: u32,
}

/// DTO for reporting a client error.
#[derive(Debug, Deserialize, Validate)]
pub struct ReportErrorRequest {
    pub category: ErrorCategory,
    pub severity: Severity,
    #[validate(length(min = 1, max = 1000))]
    pub message: String,
    #[validate(custom(function = validate_context_size))]
    pub context: Option<serde_json::Value>,
}

fn validate_context_size(context: &serde_json::Value) -> Result<(), validator::ValidationError> {
    if context.to_string().len() > 4000 {
        return Err(validator::ValidationError::new("context_too_large"));
    }
    Ok(())
}

/// Returned after recording an event: the id plus what the client should try.
#[derive(Debug, Serialize)]
pub struct RecordedError {
    pub id: Uuid,
    pub recommended_action: RecoveryAction,
    pub health: Health,
}

/// DTO for reporting the outcome of a recovery attempt.
#[derive(Debug, Deserialize)]
pub struct RecoveryReport {
    pub succeeded: bool,
}

/// What the client should do next for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "step", content = "action", rename_all = "snake_case")]
pub enum RecoveryStep {
    /// The event is resolved.
    Resolved,
    /// Try the recovery action once more.
    Retry(RecoveryAction),
    /// Attempts are exhausted; show the fallback UI.
    Escalate,
}

#[derive(Debug, Serialize)]
pub struct RecoveryOutcome {
    pub event: ErrorEvent,
    pub next: RecoveryStep,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub health: Health,
    pub total_events: usize,
    pub unrecovered: usize,
    pub by_category: BTreeMap<ErrorCategory, usize>,
}
