use thiserror::Error;

use crate::infra::config::ConfigError;

/// Application-level error taxonomy.
///
/// `InvalidToken` deliberately merges malformed input, checksum mismatch,
/// unknown prefix and wrong secret so a caller cannot learn *why* a token
/// failed. `RevokedToken` and `ExpiredToken` are the only other outcomes a
/// transport layer may surface for an authentication attempt.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has been revoked")]
    RevokedToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Token not found")]
    NotFound,

    /// Operational failure: could not allocate a unique token prefix.
    /// Surfaces as a 5xx-class condition, never a client error.
    #[error("Failed to generate a unique token prefix")]
    PrefixExhausted,

    /// Timed out waiting for a row lock. Transient; the whole operation is
    /// safe to retry.
    #[error("Timed out waiting for a token row lock")]
    LockTimeout,

    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidToken,
    RevokedToken,
    ExpiredToken,
    ValidationError,
    NotFound,
    PrefixExhausted,
    LockTimeout,
    DatabaseError,
    ConfigError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::RevokedToken => "REVOKED_TOKEN",
            ErrorCode::ExpiredToken => "EXPIRED_TOKEN",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::PrefixExhausted => "PREFIX_EXHAUSTED",
            ErrorCode::LockTimeout => "LOCK_TIMEOUT",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::ConfigError => "CONFIG_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::InvalidToken => ErrorCode::InvalidToken,
            AppError::RevokedToken => ErrorCode::RevokedToken,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::Validation(_) => ErrorCode::ValidationError,
            AppError::NotFound => ErrorCode::NotFound,
            AppError::PrefixExhausted => ErrorCode::PrefixExhausted,
            AppError::LockTimeout => ErrorCode::LockTimeout,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::Config(_) => ErrorCode::ConfigError,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
