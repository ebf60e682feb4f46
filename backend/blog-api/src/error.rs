use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Application error taxonomy, mapped onto HTTP statuses by `ResponseError`.
///
/// Store and runtime failures are caught at the handler boundary and folded
/// into these kinds; raw sqlx errors never reach a client.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Same body for unknown email and wrong password, so nothing leaks
    /// about which half was wrong.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Duplicate registration email. Clients expect 400 here, not 409.
    #[error("Email is already in use")]
    EmailInUse,

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) | AppError::EmailInUse => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_type = match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::EmailInUse => "EMAIL_IN_USE",
            AppError::Authentication(_) => "AUTHENTICATION_ERROR",
            AppError::Authorization(_) => "AUTHORIZATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
        };

        // 5xx details stay in the logs, not in the response body.
        let message = match self {
            AppError::Database(e) => {
                tracing::error!("database error: {}", e);
                "Internal server error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(status_code).json(ErrorResponse {
            error: error_type.to_string(),
            message,
        })
    }
}

impl From<auth_core::password::PasswordError> for AppError {
    fn from(error: auth_core::password::PasswordError) -> Self {
        AppError::Internal(error.to_string())
    }
}

impl From<auth_core::jwt::TokenError> for AppError {
    fn from(error: auth_core::jwt::TokenError) -> Self {
        use auth_core::jwt::TokenError;
        match error {
            TokenError::Signing(msg) => AppError::Internal(msg),
            TokenError::Uninitialized => {
                AppError::Internal("JWT secret not initialized".to_string())
            }
            other => AppError::Authentication(other.to_string()),
        }
    }
}
