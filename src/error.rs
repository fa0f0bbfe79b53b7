//! Error types for sharegate.

use thiserror::Error;

use crate::share::Denial;

/// Common error type for sharegate.
#[derive(Error, Debug)]
pub enum SharegateError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant; unique-constraint
    /// violations that callers care about are mapped to [`SharegateError::Conflict`]
    /// at the repository level instead.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication error (missing or bad credentials).
    #[error("authentication error: {0}")]
    Auth(String),

    /// Authenticated but not allowed.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Uniqueness conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Share link refused for a terminal reason.
    #[error("share link denied: {0}")]
    Denied(Denial),

    /// Blob store or bookkeeping failure that left nothing usable.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for SharegateError {
    fn from(e: sqlx::Error) -> Self {
        SharegateError::Database(e.to_string())
    }
}

impl From<Denial> for SharegateError {
    fn from(denial: Denial) -> Self {
        SharegateError::Denied(denial)
    }
}

impl From<crate::auth::PermissionError> for SharegateError {
    fn from(e: crate::auth::PermissionError) -> Self {
        SharegateError::Forbidden(e.to_string())
    }
}

/// Result type alias for sharegate operations.
pub type Result<T> = std::result::Result<T, SharegateError>;
