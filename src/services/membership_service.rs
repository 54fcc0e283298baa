//! Domain service for post membership: the only path allowed to take or
//! release seats, cancel a post, or delete it.

use thiserror::Error;

use crate::entities::posts;
use crate::models::{PostStatus, UserRole};

/// Authenticated identity performing an operation.
#[derive(Debug, Clone)]
pub struct Actor {
    pub username: String,
    pub role: UserRole,
}

impl Actor {
    #[must_use]
    pub fn new(username: impl Into<String>, role: UserRole) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    /// Ownership-or-admin predicate, evaluated before any mutation.
    #[must_use]
    pub fn may_manage(&self, post: &posts::Model) -> bool {
        self.username == post.owner_username || self.role.is_admin()
    }
}

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("Post {0} not found")]
    PostNotFound(i32),

    #[error("User '{0}' not found")]
    UserNotFound(String),

    #[error("Owner cannot join their own post")]
    OwnerCannotJoin,

    #[error("User is already a member of this post")]
    AlreadyMember,

    #[error("No available seats in this post")]
    CapacityExceeded,

    #[error("User is not a member of this post")]
    NoSuchMembership,

    #[error("Post is {0:?} and no longer accepts changes")]
    NotAcceptingChanges(PostStatus),

    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for MembershipError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for MembershipError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Domain service trait for the membership controller.
#[async_trait::async_trait]
pub trait MembershipService: Send + Sync {
    /// Reserves one seat on `post_id` for `username`.
    ///
    /// # Errors
    ///
    /// [`MembershipError::CapacityExceeded`] when every seat is taken;
    /// [`MembershipError::OwnerCannotJoin`] / [`MembershipError::AlreadyMember`]
    /// for the ownership and uniqueness invariants.
    async fn join(&self, post_id: i32, username: &str) -> Result<posts::Model, MembershipError>;

    /// Releases the seat `username` holds on `post_id`.
    async fn leave(&self, post_id: i32, username: &str) -> Result<posts::Model, MembershipError>;

    /// Removes a member on someone's behalf. The actor must be the member
    /// themselves, the post owner, or an admin.
    async fn remove_member(
        &self,
        post_id: i32,
        username: &str,
        actor: &Actor,
    ) -> Result<posts::Model, MembershipError>;

    /// Marks the post closed; a terminal state, owner or admin only.
    async fn cancel(&self, post_id: i32, actor: &Actor) -> Result<posts::Model, MembershipError>;

    /// Deletes the post and all its memberships atomically, owner or admin
    /// only.
    async fn delete_post(&self, post_id: i32, actor: &Actor) -> Result<(), MembershipError>;
}
