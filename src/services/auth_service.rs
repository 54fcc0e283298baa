//! Domain service for authentication and registration.
//!
//! The membership core only depends on this collaborator for a stable
//! `username`/`role` pair on the authenticated identity.

use thiserror::Error;

use crate::db::User;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and returns the user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if login fails.
    async fn login(&self, username: &str, password: &str) -> Result<User, AuthError>;

    /// Creates a new account with the default role.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Conflict`] when the username or email is taken.
    async fn register(&self, username: &str, email: &str, password: &str)
    -> Result<User, AuthError>;

    /// Resolves a session username back to the stored user.
    async fn get_user(&self, username: &str) -> Result<User, AuthError>;
}
