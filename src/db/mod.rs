use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::SecurityConfig;
use crate::entities::{items, posts};
use crate::models::NewPost;

pub mod migrator;
pub mod repositories;

pub use repositories::membership::JoinOutcome;
pub use repositories::user::User;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn item_repo(&self) -> repositories::item::ItemRepository {
        repositories::item::ItemRepository::new(self.conn.clone())
    }

    fn post_repo(&self) -> repositories::post::PostRepository {
        repositories::post::PostRepository::new(self.conn.clone())
    }

    fn membership_repo(&self) -> repositories::membership::MembershipRepository {
        repositories::membership::MembershipRepository::new(self.conn.clone())
    }

    // ========== Users ==========

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: &str,
        config: Option<&SecurityConfig>,
    ) -> Result<User> {
        self.user_repo()
            .create(username, email, password, role, config)
            .await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn list_users(&self, skip: u64, limit: u64) -> Result<Vec<User>> {
        self.user_repo().list(skip, limit).await
    }

    pub async fn verify_user_password(&self, username: &str, password: &str) -> Result<bool> {
        self.user_repo().verify_password(username, password).await
    }

    pub async fn update_user(
        &self,
        id: i32,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>> {
        self.user_repo().update(id, username, email).await
    }

    pub async fn delete_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().delete_cascade(id).await
    }

    // ========== Items ==========

    pub async fn create_item(
        &self,
        owner_id: i32,
        name: &str,
        description: Option<&str>,
        price: f64,
    ) -> Result<items::Model> {
        self.item_repo()
            .create(owner_id, name, description, price)
            .await
    }

    pub async fn list_items_for_user(&self, owner_id: i32) -> Result<Vec<items::Model>> {
        self.item_repo().list_for_owner(owner_id).await
    }

    // ========== Posts ==========

    pub async fn create_post(&self, owner_username: &str, post: &NewPost) -> Result<posts::Model> {
        self.post_repo().create(owner_username, post).await
    }

    pub async fn get_post(&self, post_id: i32) -> Result<Option<posts::Model>> {
        self.post_repo().get(post_id).await
    }

    pub async fn list_posts(
        &self,
        owner: Option<&str>,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<posts::Model>> {
        self.post_repo().list(owner, skip, limit).await
    }

    pub async fn set_post_status(&self, post_id: i32, status: &str) -> Result<()> {
        self.post_repo().set_status(post_id, status).await
    }

    pub async fn delete_post(&self, post_id: i32) -> Result<bool> {
        self.post_repo().delete_cascade(post_id).await
    }

    // ========== Memberships ==========

    pub async fn join_post(&self, post_id: i32, username: &str) -> Result<JoinOutcome> {
        self.membership_repo().join(post_id, username).await
    }

    pub async fn leave_post(&self, post_id: i32, username: &str) -> Result<Option<posts::Model>> {
        self.membership_repo().leave(post_id, username).await
    }

    pub async fn member_count(&self, post_id: i32) -> Result<i64> {
        self.membership_repo().member_count(post_id).await
    }

    pub async fn is_member(&self, post_id: i32, username: &str) -> Result<bool> {
        self.membership_repo().is_member(post_id, username).await
    }

    pub async fn list_members(&self, post_id: i32) -> Result<Vec<String>> {
        self.membership_repo().members(post_id).await
    }
}
