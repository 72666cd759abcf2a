use crate::database::DatabaseError;
use crate::storage::StorageError;
use crate::underwriting::{FormulaError, UnderwritingError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error;
use tracing::error;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database errors
    #[error("SQL error: {0}")]
    Sqlx(#[from] SqlxError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Missing or invalid credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// State conflicts such as duplicates or illegal status transitions
    #[error("Conflict: {0}")]
    Conflict(String),

    /// External service errors
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Object storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// UUID parsing errors
    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    /// Generic error with message
    #[error("{0}")]
    Message(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Check if error is a database connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            AppError::Database(DatabaseError::PoolCreation(_))
                | AppError::Database(DatabaseError::ConnectionTimeout)
                | AppError::Sqlx(SqlxError::PoolTimedOut)
        )
    }

    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) | AppError::InvalidUuid(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            AppError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Storage(StorageError::InvalidKey(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable error kind used in response bodies
    pub fn kind(&self) -> &'static str {
        match self.status_code() {
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::FORBIDDEN => "forbidden",
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::CONFLICT => "conflict",
            StatusCode::BAD_GATEWAY => "bad_gateway",
            _ => "internal_error",
        }
    }
}

/// JSON error body returned by every failing handler
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
            error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            match &self {
                AppError::NotFound(m)
                | AppError::Unauthorized(m)
                | AppError::Forbidden(m)
                | AppError::Validation(m)
                | AppError::Conflict(m)
                | AppError::ExternalService(m) => m.clone(),
                other => other.to_string(),
            }
        };

        let body = ErrorResponse {
            error: self.kind().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<UnderwritingError> for AppError {
    fn from(err: UnderwritingError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<FormulaError> for AppError {
    fn from(err: FormulaError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Repository-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Record not found
    #[error("Record not found")]
    NotFound(String),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Query(e) => AppError::Sqlx(e),
            RepositoryError::Duplicate(msg) => AppError::Conflict(format!("Duplicate: {}", msg)),
            RepositoryError::ConstraintViolation(msg) => AppError::Validation(msg),
            RepositoryError::InvalidInput(msg) => AppError::Validation(msg),
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => RepositoryError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                match code.as_deref() {
                    // unique_violation
                    Some("23505") => RepositoryError::Duplicate(db_err.message().to_string()),
                    // foreign_key_violation, check_violation
                    Some("23503") | Some("23514") => {
                        RepositoryError::ConstraintViolation(db_err.message().to_string())
                    }
                    // numeric_value_out_of_range
                    Some("22003") => RepositoryError::InvalidInput(db_err.message().to_string()),
                    _ => RepositoryError::Query(err),
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}

/// Convenience function to convert Option<T> to Result<T, AppError>
pub fn option_to_result<T>(opt: Option<T>, error_msg: &str) -> AppResult<T> {
    opt.ok_or_else(|| AppError::NotFound(error_msg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotFound("deal".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Forbidden("nope".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::ExternalService("down".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Message("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_error_mapping() {
        let err: AppError = RepositoryError::Duplicate("email".into()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err: AppError = RepositoryError::ConstraintViolation("amount".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err: RepositoryError = SqlxError::RowNotFound.into();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(AppError::Unauthorized("x".into()).kind(), "unauthorized");
        assert_eq!(AppError::Validation("x".into()).kind(), "bad_request");
        assert_eq!(AppError::Config("x".into()).kind(), "internal_error");
    }

    #[test]
    fn test_option_to_result() {
        let found: AppResult<i32> = option_to_result(Some(1), "missing");
        assert_eq!(found.unwrap(), 1);

        let missing: AppResult<i32> = option_to_result(None, "missing");
        assert!(missing.unwrap_err().is_not_found());
    }
}
