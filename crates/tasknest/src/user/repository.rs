//! User repository for database operations.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, instrument};

use super::models::User;

/// Result type for user lookups.
pub type UserResult<T> = Result<T, UserError>;

/// Errors that can occur during user lookups.
#[derive(Debug, Error)]
pub enum UserError {
    /// No user with the given identity.
    #[error("user not found: {0}")]
    NotFound(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a user by ID.
    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: i64) -> UserResult<User> {
        sqlx::query_as::<_, User>("SELECT id, username FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| UserError::NotFound(id.to_string()))
    }

    /// Get a user by username.
    #[instrument(skip(self))]
    pub async fn find_by_username(&self, username: &str) -> UserResult<User> {
        sqlx::query_as::<_, User>("SELECT id, username FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| UserError::NotFound(username.to_string()))
    }

    /// Get a user by username, creating it on first login.
    #[instrument(skip(self))]
    pub async fn find_or_create(&self, username: &str) -> UserResult<User> {
        match self.find_by_username(username).await {
            Ok(user) => Ok(user),
            Err(UserError::NotFound(_)) => {
                let id: i64 =
                    sqlx::query_scalar("INSERT INTO users (username) VALUES (?) RETURNING id")
                        .bind(username)
                        .fetch_one(&self.pool)
                        .await?;
                debug!(user_id = id, username, "created user on first login");
                Ok(User {
                    id,
                    username: username.to_string(),
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Check that a user exists.
    #[instrument(skip(self))]
    pub async fn exists(&self, id: i64) -> UserResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}
