//! API error handling
//!
//! Every failure leaves the server as `{"error": <message>, "code": <CODE>}`.
//! Internal and database failures are logged with their details and
//! answered with a generic message.

use crate::auth::jwt::TokenError;
use crate::auth::password::PasswordError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use evently_core::EventlyError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Human-readable message
    pub error: String,
    /// Machine-readable error code
    pub code: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    Unauthorized(String),
    InvalidCredentials,
    Forbidden(String),
    NotFound(String),
    AlreadyExists(String),
    Conflict(String),
    InvalidTransition(String),
    Internal(String),
    Database(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) | AppError::Conflict(_) | AppError::InvalidTransition(_) => {
                StatusCode::CONFLICT
            }
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::AlreadyExists(_) => "ALREADY_EXISTS",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InvalidTransition(_) => "INVALID_TRANSITION",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
        }
    }

    pub fn not_found(resource: &str) -> Self {
        AppError::NotFound(format!("{resource} not found"))
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::InvalidCredentials => f.write_str("Invalid email or password"),
            AppError::Validation(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::AlreadyExists(msg)
            | AppError::Conflict(msg)
            | AppError::InvalidTransition(msg)
            | AppError::Internal(msg)
            | AppError::Database(msg) => f.write_str(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(details) => {
                tracing::error!(details = %details, "Internal error");
                "Internal server error".to_string()
            }
            AppError::Database(details) => {
                tracing::error!(details = %details, "Database error");
                "Database operation failed".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ApiError::new(self.code(), message))).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<EventlyError> for AppError {
    fn from(err: EventlyError) -> Self {
        match err {
            EventlyError::NotFound(what) => AppError::not_found(&what),
            EventlyError::AlreadyExists(what) => AppError::AlreadyExists(format!("{what} already exists")),
            EventlyError::Conflict(msg) => AppError::Conflict(msg),
            EventlyError::InvalidCredentials => AppError::InvalidCredentials,
            EventlyError::AccessDenied { reason } => AppError::Forbidden(reason),
            EventlyError::ValidationError(msg) => AppError::Validation(msg),
            transition @ EventlyError::InvalidTransition { .. } => {
                AppError::InvalidTransition(transition.to_string())
            }
            EventlyError::DatabaseError(msg) => AppError::Database(msg),
            EventlyError::ConfigError(msg) => AppError::Internal(format!("Configuration error: {msg}")),
            EventlyError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding(e) => AppError::Internal(format!("Failed to sign token: {e}")),
            TokenError::Expired => AppError::Unauthorized("Token has expired".to_string()),
            TokenError::KindMismatch { .. } | TokenError::InvalidToken | TokenError::UnknownKind(_) => {
                AppError::Unauthorized("Invalid token".to_string())
            }
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reason = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{field} {reason}")
            })
            .collect();
        fields.sort();
        AppError::Validation(fields.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evently_core::EventStatus;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(AppError, StatusCode)> = vec![
            (EventlyError::ValidationError("x".into()).into(), StatusCode::BAD_REQUEST),
            (EventlyError::InvalidCredentials.into(), StatusCode::UNAUTHORIZED),
            (
                EventlyError::AccessDenied { reason: "no".into() }.into(),
                StatusCode::FORBIDDEN,
            ),
            (EventlyError::NotFound("Event".into()).into(), StatusCode::NOT_FOUND),
            (EventlyError::AlreadyExists("User".into()).into(), StatusCode::CONFLICT),
            (EventlyError::Conflict("busy".into()).into(), StatusCode::CONFLICT),
            (
                EventlyError::InvalidTransition {
                    from: EventStatus::Approved,
                    to: EventStatus::Rejected,
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (EventlyError::DatabaseError("boom".into()).into(), StatusCode::INTERNAL_SERVER_ERROR),
            (TokenError::Expired.into(), StatusCode::UNAUTHORIZED),
        ];

        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err:?}");
        }
    }

    #[test]
    fn test_not_found_message() {
        let err: AppError = EventlyError::NotFound("Event".into()).into();
        assert_eq!(err.to_string(), "Event not found");
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let response = AppError::Database("password authentication failed".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
