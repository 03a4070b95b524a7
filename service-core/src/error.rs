use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Service-wide error taxonomy.
///
/// Token failures distinguish a bad signature (`TokenInvalid`) from an
/// elapsed TTL (`TokenExpired`) so callers can return the right kind.
/// Login failures always map to `AuthFailed` with a generic message;
/// only the signup duplicate check surfaces `UserExists`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    /// Validation failure detected past the extractor layer, inside a
    /// service. Renders the same 422 shape as `ValidationError`.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Authentication failed")]
    AuthFailed(anyhow::Error),

    #[error("Invalid token")]
    TokenInvalid(anyhow::Error),

    #[error("Token expired")]
    TokenExpired,

    #[error("User already exists")]
    UserExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::TokenInvalid(anyhow::Error::new(err)),
        }
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::EmailError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            AppError::ValidationError(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                "Validation error".to_string(),
                Some(err.to_string()),
            ),
            AppError::InvalidInput(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                "Validation error".to_string(),
                Some(msg),
            ),
            AppError::BadRequest(err) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                err.to_string(),
                None,
            ),
            AppError::AuthFailed(err) => {
                // Cause stays in logs; the response never says why.
                tracing::warn!(error = %err, "authentication failed");
                (
                    StatusCode::UNAUTHORIZED,
                    "AUTH_FAILED",
                    "Authentication failed".to_string(),
                    None,
                )
            }
            AppError::TokenInvalid(err) => {
                tracing::debug!(error = %err, "invalid token presented");
                (
                    StatusCode::BAD_REQUEST,
                    "TOKEN_INVALID",
                    "Invalid token".to_string(),
                    None,
                )
            }
            AppError::TokenExpired => (
                StatusCode::BAD_REQUEST,
                "TOKEN_EXPIRED",
                "Token expired".to_string(),
                None,
            ),
            AppError::UserExists => (
                StatusCode::CONFLICT,
                "USER_EXISTS",
                "User already exists".to_string(),
                None,
            ),
            AppError::UserNotFound => (
                StatusCode::NOT_FOUND,
                "USER_NOT_FOUND",
                "User not found".to_string(),
                None,
            ),
            AppError::DatabaseError(err) => {
                tracing::error!(error = %err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SERVER_ERROR",
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::EmailError(msg) => {
                tracing::error!(error = %msg, "email delivery error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SERVER_ERROR",
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %err, "configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SERVER_ERROR",
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::InternalError(err) => {
                tracing::error!(error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SERVER_ERROR",
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: message,
            code,
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failed_maps_to_401() {
        let err = AppError::AuthFailed(anyhow::anyhow!("wrong password for bob"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn expired_and_invalid_tokens_are_distinct() {
        let expired = AppError::TokenExpired;
        let invalid = AppError::TokenInvalid(anyhow::anyhow!("bad signature"));
        assert_eq!(
            expired.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            invalid.into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn invalid_input_maps_to_422() {
        let err = AppError::InvalidInput("password too short".to_string());
        assert_eq!(
            err.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn user_exists_maps_to_conflict() {
        assert_eq!(
            AppError::UserExists.into_response().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn jwt_expiry_converts_to_token_expired() {
        let err = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::ExpiredSignature,
        );
        assert!(matches!(AppError::from(err), AppError::TokenExpired));
    }
}
