// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request (malformed input shape/format)
    BadRequest(String),

    // 400 Bad Request with per-field details from `validator`
    Validation(validator::ValidationErrors),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (quota or capability exceeded)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., code already redeemed, double submit)
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
///
/// All domain errors become a structured `{"error": {kind, message}}` body;
/// validation errors additionally carry `fieldErrors`. Internal errors are
/// logged with full detail and surfaced as a generic message.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message, field_errors) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal Server Error".to_string(),
                    None,
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation", msg, None),
            AppError::Validation(errors) => {
                let fields: serde_json::Value =
                    serde_json::to_value(errors.field_errors()).unwrap_or_else(|_| json!({}));
                (
                    StatusCode::BAD_REQUEST,
                    "validation",
                    "Request validation failed".to_string(),
                    Some(fields),
                )
            }
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, "unauthenticated", msg, None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
        };

        let mut error = json!({
            "kind": kind,
            "message": message,
        });
        if let Some(fields) = field_errors {
            error["fieldErrors"] = fields;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Lets handlers write `payload.validate()?`.
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}
