//! Repository Module
//!
//! SQL access for every table. Single-statement operations take any
//! `SqliteExecutor` (pool or open transaction); multi-statement operations
//! take `&mut SqliteConnection` so callers decide the transaction boundary.

pub mod business_member;
pub mod member;
pub mod merchant;
pub mod merchant_member;
pub mod redemption;
pub mod reward;
pub mod reward_transaction;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.message().contains("UNIQUE") => {
                RepoError::Duplicate(db.message().to_string())
            }
            _ => RepoError::Database(err.to_string()),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
