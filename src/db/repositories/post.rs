use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use tracing::info;

use crate::entities::{post_members, posts, prelude::*};
use crate::models::NewPost;

pub struct PostRepository {
    conn: DatabaseConnection,
}

impl PostRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, owner_username: &str, post: &NewPost) -> Result<posts::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = posts::ActiveModel {
            owner_username: Set(owner_username.to_string()),
            origin: Set(post.origin.value().to_string()),
            destination: Set(post.destination.value().to_string()),
            departure_at: Set(post.departure_at.to_rfc3339()),
            capacity: Set(post.capacity),
            engaged_count: Set(0),
            status: Set("open".to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert post")?;

        info!(
            "Created post {} ({} -> {}, {} seats) by {}",
            model.id, model.origin, model.destination, model.capacity, model.owner_username
        );

        Ok(model)
    }

    pub async fn get(&self, post_id: i32) -> Result<Option<posts::Model>> {
        Posts::find_by_id(post_id)
            .one(&self.conn)
            .await
            .context("Failed to query post by ID")
    }

    /// Page of posts in primary-key ascending order; optionally restricted
    /// to one owner.
    pub async fn list(
        &self,
        owner: Option<&str>,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<posts::Model>> {
        let mut query = Posts::find().order_by_asc(posts::Column::Id);

        if let Some(owner) = owner {
            query = query.filter(posts::Column::OwnerUsername.eq(owner));
        }

        query
            .offset(skip)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to list posts")
    }

    pub async fn set_status(&self, post_id: i32, status: &str) -> Result<()> {
        Posts::update_many()
            .col_expr(
                posts::Column::Status,
                sea_orm::sea_query::Expr::value(status),
            )
            .col_expr(
                posts::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(posts::Column::Id.eq(post_id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Delete a post together with all its membership rows, atomically.
    pub async fn delete_cascade(&self, post_id: i32) -> Result<bool> {
        let txn = self.conn.begin().await?;

        post_members::Entity::delete_many()
            .filter(post_members::Column::PostId.eq(post_id))
            .exec(&txn)
            .await?;

        let result = Posts::delete_by_id(post_id).exec(&txn).await?;

        txn.commit().await?;

        let removed = result.rows_affected > 0;
        if removed {
            info!("Removed post with ID: {}", post_id);
        }
        Ok(removed)
    }
}
