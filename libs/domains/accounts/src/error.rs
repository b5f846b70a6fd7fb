use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::models::{Email, UserId};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("User with email '{0}' already exists")]
    DuplicateEmail(Email),

    #[error("The token is invalid")]
    InvalidToken,

    #[error("The link has expired")]
    TokenExpired,

    #[error("Account has already been activated")]
    AlreadyVerified,

    #[error("Password encoding failed: {0}")]
    EncodingFailure(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AccountResult<T> = Result<T, AccountError>;

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AccountError::UserNotFound(id) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("User {} not found", id),
            ),
            AccountError::DuplicateEmail(email) => (
                StatusCode::CONFLICT,
                "duplicate_email",
                format!("An account with email '{}' already exists", email),
            ),
            // Unknown tokens and tokens bound to unusable accounts are not
            // distinguishable from the outside.
            AccountError::InvalidToken => (
                StatusCode::NOT_FOUND,
                "invalid_token",
                "The token is invalid.".to_string(),
            ),
            // Distinct from invalid so callers can offer re-issuance.
            AccountError::TokenExpired => (
                StatusCode::METHOD_NOT_ALLOWED,
                "token_expired",
                "The link has expired.".to_string(),
            ),
            AccountError::AlreadyVerified => (
                StatusCode::BAD_REQUEST,
                "already_verified",
                "Your account has already been activated.".to_string(),
            ),
            AccountError::EncodingFailure(msg) => {
                tracing::error!("Password encoding error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AccountError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            AccountError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (
            status,
            Json(json!({
                "error": {
                    "type": error_type,
                    "message": message
                }
            })),
        )
            .into_response()
    }
}
