//! Task domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Result type for task operations.
pub type TaskResult<T> = Result<T, TaskError>;

/// Errors that can occur during task operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The creating user does not exist.
    #[error("user not found: {0}")]
    UserNotFound(i64),

    /// A referenced parent task does not exist.
    #[error("parent task not found: {0}")]
    ParentNotFound(Uuid),

    /// An update matched no rows.
    #[error("no rows affected")]
    NothingUpdated,

    /// The parent chain exceeded the task count; the ancestry links loop.
    #[error("ancestry loop detected walking up from {0}")]
    AncestryLoop(Uuid),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
