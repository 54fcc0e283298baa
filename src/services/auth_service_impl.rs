//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;

use crate::config::SecurityConfig;
use crate::db::{Store, User};
use crate::models::UserRole;
use crate::services::auth_service::{AuthError, AuthService};

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig) -> Self {
        Self { store, security }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let is_valid = self.store.verify_user_password(username, password).await?;

        if !is_valid {
            return Err(AuthError::InvalidCredentials);
        }

        self.store
            .get_user_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let username = username.trim();
        let email = email.trim();

        if username.is_empty() {
            return Err(AuthError::Validation("Username is required".to_string()));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::Validation(
                "A valid email is required".to_string(),
            ));
        }
        if password.len() < 8 {
            return Err(AuthError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        // Pre-checked here for a useful message; the unique columns catch
        // the race.
        if self.store.get_user_by_username(username).await?.is_some() {
            return Err(AuthError::Conflict("Username already registered".to_string()));
        }
        if self.store.get_user_by_email(email).await?.is_some() {
            return Err(AuthError::Conflict("Email already registered".to_string()));
        }

        let user = self
            .store
            .create_user(
                username,
                email,
                password,
                UserRole::User.value(),
                Some(&self.security),
            )
            .await?;

        tracing::info!("Registered user: {}", user.username);
        Ok(user)
    }

    async fn get_user(&self, username: &str) -> Result<User, AuthError> {
        self.store
            .get_user_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}
