//! Error types for the storage layer.

use engram_protocol::{ErrorKind, ToolError};
use thiserror::Error;

/// Storage operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Storage errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error (connection, query, etc.)
    #[error("Database error: {0}")]
    Sqlx(sqlx::Error),

    /// Pool exhausted or acquire timed out; retryable.
    #[error("Connection pool at capacity")]
    Capacity,

    /// Target row does not exist or is soft-deleted.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row state violates the operation's precondition (e.g. double delete).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Session prerequisite missing (no current project).
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Constraint violation (unique, foreign key, check).
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Serialization error for jsonb payloads.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Migration failure at startup.
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Map to the structured tool error crossing the handler boundary.
    /// Internal detail (SQL text, connection info) never leaks; callers
    /// log it before converting.
    pub fn to_tool_error(&self) -> ToolError {
        match self {
            Self::NotFound(msg) => ToolError::not_found(msg.clone()),
            Self::Conflict(msg) => ToolError::conflict(msg.clone()),
            Self::Precondition(msg) => ToolError::precondition(msg.clone()),
            Self::Capacity => ToolError::capacity("Database busy, retry shortly"),
            Self::Constraint(_) => ToolError::conflict("Constraint violation"),
            Self::Sqlx(_) | Self::Serialization(_) | Self::Migrate(_) => {
                ToolError::new(ErrorKind::Fatal, "Database operation failed")
            }
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => Self::Capacity,
            sqlx::Error::RowNotFound => Self::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.constraint().is_some() => {
                Self::Constraint(db.message().to_string())
            }
            other => Self::Sqlx(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_maps_to_capacity() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DbError::Capacity));
        assert_eq!(err.to_tool_error().code(), 500);
        assert!(err.to_tool_error().kind.is_retryable());
    }

    #[test]
    fn tool_error_codes() {
        assert_eq!(DbError::not_found("x").to_tool_error().code(), 404);
        assert_eq!(DbError::conflict("x").to_tool_error().code(), 409);
        assert_eq!(DbError::precondition("x").to_tool_error().code(), 400);
    }

    #[test]
    fn internal_errors_stay_generic() {
        let err: DbError = sqlx::Error::WorkerCrashed.into();
        let tool = err.to_tool_error();
        assert_eq!(tool.message, "Database operation failed");
    }
}
