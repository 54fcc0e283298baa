use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use tracing::{debug, warn};

use crate::entities::{post_members, posts, prelude::*};

/// Result of one join attempt against the store.
#[derive(Debug)]
pub enum JoinOutcome {
    /// Seat taken; carries the post as committed.
    Joined(posts::Model),
    /// The conditional increment matched no row: every seat is taken.
    CapacityExhausted,
    /// A membership row for this (post, user) pair already exists.
    AlreadyMember,
}

/// The only write path for `engaged_count` and membership rows.
///
/// The join transaction opens with the conditional increment so racing
/// joins serialize on the post row instead of deadlocking on a read-to-
/// write lock upgrade. The membership row count is recomputed inside the
/// same transaction and written back, so the cached counter cannot drift
/// from the source of truth past a single commit.
pub struct MembershipRepository {
    conn: DatabaseConnection,
}

impl MembershipRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Take one seat for `username` on `post_id`.
    ///
    /// Retries the full check-and-commit exactly once when the store
    /// reports a write conflict from a lost race.
    pub async fn join(&self, post_id: i32, username: &str) -> Result<JoinOutcome> {
        match self.try_join(post_id, username).await {
            Ok(outcome) => Ok(outcome),
            Err(err) if is_write_conflict(&err) => {
                warn!(
                    "Join race detected for post {post_id}, user {username}; retrying capacity check"
                );
                self.try_join(post_id, username)
                    .await
                    .context("Failed to join post after retry")
            }
            Err(err) => Err(err).context("Failed to join post"),
        }
    }

    async fn try_join(&self, post_id: i32, username: &str) -> Result<JoinOutcome, DbErr> {
        let txn = self.conn.begin().await?;

        // First statement is the write: one seat, only while seats remain.
        let claimed = Posts::update_many()
            .col_expr(
                posts::Column::EngagedCount,
                Expr::col(posts::Column::EngagedCount).add(1),
            )
            .filter(posts::Column::Id.eq(post_id))
            .filter(Expr::col(posts::Column::EngagedCount).lt(Expr::col(posts::Column::Capacity)))
            .exec(&txn)
            .await?;

        if claimed.rows_affected == 0 {
            // Zero rows can also mean a counter overstated by writes outside
            // this path. The membership rows decide; a stale counter gets one
            // seat past the gate here and is rewritten from the row count
            // before commit.
            let Some(post) = Posts::find_by_id(post_id).one(&txn).await? else {
                txn.rollback().await?;
                return Ok(JoinOutcome::CapacityExhausted);
            };

            let rows = PostMembers::find()
                .filter(post_members::Column::PostId.eq(post_id))
                .count(&txn)
                .await?;
            let rows = i64::try_from(rows).unwrap_or(i64::MAX);

            if rows >= i64::from(post.capacity) {
                txn.rollback().await?;
                return Ok(JoinOutcome::CapacityExhausted);
            }

            warn!(
                "Seat counter for post {post_id} read {} against {rows} membership rows; realigning",
                post.engaged_count
            );

            Posts::update_many()
                .col_expr(
                    posts::Column::EngagedCount,
                    Expr::value(i32::try_from(rows).unwrap_or(i32::MAX).saturating_add(1)),
                )
                .filter(posts::Column::Id.eq(post_id))
                .exec(&txn)
                .await?;
        }

        // Composite PK is the duplicate backstop for races past the
        // caller's membership pre-check.
        let insert = post_members::ActiveModel {
            post_id: Set(post_id),
            member_username: Set(username.to_string()),
            joined_at: Set(chrono::Utc::now().to_rfc3339()),
        }
        .insert(&txn)
        .await;

        if let Err(err) = insert {
            let duplicate = matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)));
            txn.rollback().await?;
            if duplicate {
                return Ok(JoinOutcome::AlreadyMember);
            }
            return Err(err);
        }

        // Authoritative count: the membership rows, not the counter we just
        // bumped. Re-validates capacity and heals any prior drift.
        let count = self.reconcile_count(&txn, post_id).await?;

        let Some(post) = Posts::find_by_id(post_id).one(&txn).await? else {
            txn.rollback().await?;
            return Err(DbErr::RecordNotFound(format!(
                "post {post_id} vanished mid-join"
            )));
        };

        if count > i64::from(post.capacity) {
            txn.rollback().await?;
            return Ok(JoinOutcome::CapacityExhausted);
        }

        txn.commit().await?;

        debug!("User {username} joined post {post_id} ({count}/{})", post.capacity);
        Ok(JoinOutcome::Joined(post))
    }

    /// Release `username`'s seat on `post_id`. Returns the updated post, or
    /// `None` if no such membership existed.
    pub async fn leave(&self, post_id: i32, username: &str) -> Result<Option<posts::Model>> {
        let txn = self
            .conn
            .begin()
            .await
            .context("Failed to open leave transaction")?;

        let deleted = post_members::Entity::delete_many()
            .filter(post_members::Column::PostId.eq(post_id))
            .filter(post_members::Column::MemberUsername.eq(username))
            .exec(&txn)
            .await?;

        if deleted.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(None);
        }

        self.reconcile_count(&txn, post_id).await?;

        let post = Posts::find_by_id(post_id).one(&txn).await?;

        txn.commit().await?;

        debug!("User {username} left post {post_id}");
        Ok(post)
    }

    /// Recompute the membership row count for a post and write it back as
    /// the engaged counter. Must run inside the mutating transaction.
    async fn reconcile_count(
        &self,
        txn: &sea_orm::DatabaseTransaction,
        post_id: i32,
    ) -> Result<i64, DbErr> {
        let count = PostMembers::find()
            .filter(post_members::Column::PostId.eq(post_id))
            .count(txn)
            .await?;
        let count = i64::try_from(count).unwrap_or(i64::MAX);

        Posts::update_many()
            .col_expr(
                posts::Column::EngagedCount,
                Expr::value(i32::try_from(count).unwrap_or(i32::MAX)),
            )
            .col_expr(
                posts::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(posts::Column::Id.eq(post_id))
            .exec(txn)
            .await?;

        Ok(count)
    }

    pub async fn member_count(&self, post_id: i32) -> Result<i64> {
        let count = PostMembers::find()
            .filter(post_members::Column::PostId.eq(post_id))
            .count(&self.conn)
            .await
            .context("Failed to count post members")?;
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    pub async fn is_member(&self, post_id: i32, username: &str) -> Result<bool> {
        let existing = PostMembers::find_by_id((post_id, username.to_string()))
            .one(&self.conn)
            .await
            .context("Failed to query membership")?;
        Ok(existing.is_some())
    }

    pub async fn members(&self, post_id: i32) -> Result<Vec<String>> {
        let rows = PostMembers::find()
            .filter(post_members::Column::PostId.eq(post_id))
            .order_by_asc(post_members::Column::JoinedAt)
            .all(&self.conn)
            .await
            .context("Failed to list post members")?;

        Ok(rows.into_iter().map(|m| m.member_username).collect())
    }
}

/// SQLite reports lost write races as busy/locked errors rather than a
/// dedicated serialization failure class.
fn is_write_conflict(err: &DbErr) -> bool {
    let text = err.to_string();
    text.contains("database is locked") || text.contains("database table is locked")
}
