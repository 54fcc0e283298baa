use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::entities::{items, post_members, posts, prelude::*, users};

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            role: model.role,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a new user with a hashed password. Uniqueness of username and
    /// email is pre-checked by the caller; the unique columns are the backstop.
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: &str,
        config: Option<&SecurityConfig>,
    ) -> Result<User> {
        let password = password.to_string();
        let config = config.cloned();
        let password_hash =
            task::spawn_blocking(move || hash_password(&password, config.as_ref()))
                .await
                .context("Password hashing task panicked")??;

        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash),
            role: Set(role.to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        Ok(User::from(model))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn list(&self, skip: u64, limit: u64) -> Result<Vec<User>> {
        let users = Users::find()
            .order_by_asc(users::Column::Id)
            .offset(skip)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(users.into_iter().map(User::from).collect())
    }

    pub async fn count(&self) -> Result<u64> {
        Users::find()
            .count(&self.conn)
            .await
            .context("Failed to count users")
    }

    /// Verify password for a user
    /// Note: This uses `spawn_blocking` because Argon2 hashing is CPU-intensive
    /// and would block the async runtime if run directly.
    pub async fn verify_password(&self, username: &str, password: &str) -> Result<bool> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(false);
        };

        let password_hash = user.password_hash;
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            let argon2 = Argon2::default();
            Ok::<bool, anyhow::Error>(
                argon2
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        Ok(is_valid)
    }

    /// Update profile fields that were provided; absent fields keep their
    /// value. Posts and memberships key on the username, so a rename moves
    /// those rows in the same transaction with foreign key checks deferred
    /// to commit.
    pub async fn update(
        &self,
        id: i32,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>> {
        let Some(user) = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for update")?
        else {
            return Ok(None);
        };

        let now = chrono::Utc::now().to_rfc3339();
        let old_username = user.username.clone();

        let txn = self
            .conn
            .begin()
            .await
            .context("Failed to open update transaction")?;

        if let Some(new_username) = username
            && new_username != old_username
        {
            txn.execute_unprepared("PRAGMA defer_foreign_keys = ON")
                .await
                .context("Failed to defer foreign key checks")?;

            Posts::update_many()
                .col_expr(posts::Column::OwnerUsername, Expr::value(new_username))
                .filter(posts::Column::OwnerUsername.eq(old_username.clone()))
                .exec(&txn)
                .await
                .context("Failed to rename post owner")?;

            post_members::Entity::update_many()
                .col_expr(
                    post_members::Column::MemberUsername,
                    Expr::value(new_username),
                )
                .filter(post_members::Column::MemberUsername.eq(old_username))
                .exec(&txn)
                .await
                .context("Failed to rename post member")?;
        }

        let mut active: users::ActiveModel = user.into();
        if let Some(username) = username {
            active.username = Set(username.to_string());
        }
        if let Some(email) = email {
            active.email = Set(email.to_string());
        }
        active.updated_at = Set(now);

        let model = active
            .update(&txn)
            .await
            .context("Failed to update user")?;

        txn.commit()
            .await
            .context("Failed to commit user update")?;

        Ok(Some(User::from(model)))
    }

    /// Delete a user and everything they own: items, posts (with their
    /// memberships), and memberships held on other users' posts. All within
    /// one transaction so a failure leaves nothing half-removed.
    pub async fn delete_cascade(&self, id: i32) -> Result<Option<User>> {
        let Some(user) = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for deletion")?
        else {
            return Ok(None);
        };

        let txn = self.conn.begin().await?;

        items::Entity::delete_many()
            .filter(items::Column::OwnerId.eq(id))
            .exec(&txn)
            .await?;

        let owned_posts: Vec<i32> = Posts::find()
            .filter(posts::Column::OwnerUsername.eq(user.username.clone()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        if !owned_posts.is_empty() {
            post_members::Entity::delete_many()
                .filter(post_members::Column::PostId.is_in(owned_posts.clone()))
                .exec(&txn)
                .await?;

            Posts::delete_many()
                .filter(posts::Column::Id.is_in(owned_posts))
                .exec(&txn)
                .await?;
        }

        // Seats this user held on other posts; the counters there are
        // reconciled from the row count.
        let held: Vec<i32> = PostMembers::find()
            .filter(post_members::Column::MemberUsername.eq(user.username.clone()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|m| m.post_id)
            .collect();

        post_members::Entity::delete_many()
            .filter(post_members::Column::MemberUsername.eq(user.username.clone()))
            .exec(&txn)
            .await?;

        for post_id in held {
            let count = PostMembers::find()
                .filter(post_members::Column::PostId.eq(post_id))
                .count(&txn)
                .await?;

            Posts::update_many()
                .col_expr(
                    posts::Column::EngagedCount,
                    sea_orm::sea_query::Expr::value(i32::try_from(count).unwrap_or(i32::MAX)),
                )
                .filter(posts::Column::Id.eq(post_id))
                .exec(&txn)
                .await?;
        }

        Users::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;

        Ok(Some(User::from(user)))
    }
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses default params.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
