// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::models::{diagnostics::ErrorCategory, session::SessionError};
use crate::store::StoreError;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., answering a closed session)
    Conflict(String),
}

impl AppError {
    /// Category reported to clients alongside the message.
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::InternalServerError(_) => ErrorCategory::Unknown,
            AppError::AuthError(_) | AppError::Forbidden(_) => ErrorCategory::Auth,
            AppError::BadRequest(_) | AppError::NotFound(_) | AppError::Conflict(_) => {
                ErrorCategory::Data
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
/// Internal errors never leak their message; the client gets an id to quote instead.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let category = self.category();
        let (status, body) = match self {
            AppError::InternalServerError(msg) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "Internal Server Error",
                        "category": category,
                        "error_id": error_id,
                    }),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body(msg, category)),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, error_body(msg, category)),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, error_body(msg, category)),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body(msg, category)),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, error_body(msg, category)),
        };

        (status, Json(body)).into_response()
    }
}

fn error_body(message: String, category: ErrorCategory) -> serde_json::Value {
    json!({
        "error": message,
        "category": category,
    })
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict => {
                AppError::Conflict("The record was modified concurrently, please retry".to_string())
            }
            StoreError::NotFound => AppError::NotFound("Record not found".to_string()),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotActive(_) | SessionError::TimeExpired | SessionError::AlreadyAnswered(_) => {
                AppError::Conflict(err.to_string())
            }
            SessionError::IndexOutOfRange { .. }
            | SessionError::OptionOutOfRange { .. }
            | SessionError::AlreadyPaused
            | SessionError::NotPaused => AppError::BadRequest(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
