use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed")]
    AuthFailed,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("User already exists")]
    UserExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Database error: {0}")]
    Database(anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => AppError::InvalidInput(msg),
            ServiceError::AuthFailed => {
                AppError::AuthFailed(anyhow::anyhow!("credentials rejected"))
            }
            ServiceError::TokenInvalid => {
                AppError::TokenInvalid(anyhow::anyhow!("unknown or malformed token"))
            }
            ServiceError::TokenExpired => AppError::TokenExpired,
            ServiceError::UserExists => AppError::UserExists,
            ServiceError::UserNotFound => AppError::UserNotFound,
            // Provider failures surface as 500; the original message is kept
            // for logs only.
            ServiceError::Provider(msg) => AppError::InternalError(anyhow::anyhow!(msg)),
            ServiceError::Email(msg) => AppError::EmailError(msg),
            ServiceError::Database(e) => AppError::DatabaseError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn service_validation_renders_as_422() {
        let err: AppError = ServiceError::Validation("currentPassword required".to_string()).into();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(
            err.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn auth_failure_hides_the_cause() {
        let err: AppError = ServiceError::AuthFailed.into();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
