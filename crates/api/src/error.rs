use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use issuefleet_core::error::CoreError;
use issuefleet_db::RepoError;
use serde_json::json;

use crate::executor::ExecutorError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `issuefleet_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The node agent could not be reached or answered with an error.
    #[error("Node agent unreachable: {0}")]
    NodeUnreachable(String),

    /// The node agent did not answer within the caller's timeout.
    #[error("Node agent timed out: {0}")]
    NodeTimeout(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Core(e) => AppError::Core(e),
            RepoError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<ExecutorError> for AppError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Timeout { .. } => AppError::NodeTimeout(err.to_string()),
            ExecutorError::Request(_) | ExecutorError::Agent { .. } => {
                AppError::NodeUnreachable(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => classify_core_error(core),

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- HTTP-specific errors ---
            AppError::NodeUnreachable(msg) => {
                tracing::warn!(error = %msg, "Node agent unreachable");
                (StatusCode::BAD_GATEWAY, "NODE_UNREACHABLE", msg.clone())
            }
            AppError::NodeTimeout(msg) => {
                tracing::warn!(error = %msg, "Node agent timed out");
                (StatusCode::GATEWAY_TIMEOUT, "NODE_TIMEOUT", msg.clone())
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::AlreadyClaimed { .. } => (StatusCode::CONFLICT, "ALREADY_CLAIMED", message),
        CoreError::CyclicDependency { .. } => {
            (StatusCode::CONFLICT, "CYCLIC_DEPENDENCY", message)
        }
        CoreError::DependencyInUse { .. } => {
            (StatusCode::CONFLICT, "DEPENDENCY_IN_USE", message)
        }
        CoreError::InvalidTransition { .. } => {
            (StatusCode::CONFLICT, "INVALID_TRANSITION", message)
        }
        CoreError::InvalidRegistrationKey => {
            (StatusCode::UNAUTHORIZED, "INVALID_REGISTRATION_KEY", message)
        }
        CoreError::ExpiredKey => (StatusCode::UNAUTHORIZED, "EXPIRED_KEY", message),
        CoreError::NoWorkAvailable => (StatusCode::NOT_FOUND, "NO_WORK_AVAILABLE", message),
        CoreError::NoCredentialAvailable { .. } => {
            (StatusCode::NOT_FOUND, "NO_CREDENTIAL_AVAILABLE", message)
        }
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
