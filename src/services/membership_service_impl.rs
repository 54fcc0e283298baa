//! `SeaORM` implementation of the `MembershipService` trait.

use async_trait::async_trait;
use chrono::Utc;

use crate::db::{JoinOutcome, Store};
use crate::entities::posts;
use crate::models::PostStatus;
use crate::services::membership_service::{Actor, MembershipError, MembershipService};

pub struct SeaOrmMembershipService {
    store: Store,
}

impl SeaOrmMembershipService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    async fn load_post(&self, post_id: i32) -> Result<posts::Model, MembershipError> {
        self.store
            .get_post(post_id)
            .await?
            .ok_or(MembershipError::PostNotFound(post_id))
    }

    /// Rejects operations on closed or departed posts.
    fn ensure_mutable(post: &posts::Model) -> Result<(), MembershipError> {
        let status = PostStatus::derive(
            &post.status,
            post.engaged_count,
            post.capacity,
            &post.departure_at,
            Utc::now(),
        );
        if status.accepts_changes() {
            Ok(())
        } else {
            Err(MembershipError::NotAcceptingChanges(status))
        }
    }
}

#[async_trait]
impl MembershipService for SeaOrmMembershipService {
    async fn join(&self, post_id: i32, username: &str) -> Result<posts::Model, MembershipError> {
        let post = self.load_post(post_id).await?;
        Self::ensure_mutable(&post)?;

        if self
            .store
            .get_user_by_username(username)
            .await?
            .is_none()
        {
            return Err(MembershipError::UserNotFound(username.to_string()));
        }

        if post.owner_username == username {
            return Err(MembershipError::OwnerCannotJoin);
        }

        if self.store.is_member(post_id, username).await? {
            return Err(MembershipError::AlreadyMember);
        }

        // Authoritative fast-fail before touching anything; the transaction
        // in the store re-validates this under the write lock.
        let current = self.store.member_count(post_id).await?;
        if current >= i64::from(post.capacity) {
            return Err(MembershipError::CapacityExceeded);
        }

        match self.store.join_post(post_id, username).await? {
            JoinOutcome::Joined(post) => Ok(post),
            JoinOutcome::CapacityExhausted => Err(MembershipError::CapacityExceeded),
            JoinOutcome::AlreadyMember => Err(MembershipError::AlreadyMember),
        }
    }

    async fn leave(&self, post_id: i32, username: &str) -> Result<posts::Model, MembershipError> {
        let post = self.load_post(post_id).await?;
        Self::ensure_mutable(&post)?;

        self.store
            .leave_post(post_id, username)
            .await?
            .ok_or(MembershipError::NoSuchMembership)
    }

    async fn remove_member(
        &self,
        post_id: i32,
        username: &str,
        actor: &Actor,
    ) -> Result<posts::Model, MembershipError> {
        let post = self.load_post(post_id).await?;

        if actor.username != username && !actor.may_manage(&post) {
            return Err(MembershipError::Forbidden(
                "Only the member, the post owner, or an admin may remove a member".to_string(),
            ));
        }

        Self::ensure_mutable(&post)?;

        self.store
            .leave_post(post_id, username)
            .await?
            .ok_or(MembershipError::NoSuchMembership)
    }

    async fn cancel(&self, post_id: i32, actor: &Actor) -> Result<posts::Model, MembershipError> {
        let post = self.load_post(post_id).await?;

        if !actor.may_manage(&post) {
            return Err(MembershipError::Forbidden(
                "Only the post owner or an admin may cancel a post".to_string(),
            ));
        }

        Self::ensure_mutable(&post)?;

        self.store
            .set_post_status(post_id, PostStatus::Closed.value())
            .await?;

        tracing::info!("Post {post_id} cancelled by {}", actor.username);

        self.load_post(post_id).await
    }

    async fn delete_post(&self, post_id: i32, actor: &Actor) -> Result<(), MembershipError> {
        let post = self.load_post(post_id).await?;

        if !actor.may_manage(&post) {
            return Err(MembershipError::Forbidden(
                "Only the post owner or an admin may delete a post".to_string(),
            ));
        }

        let removed = self.store.delete_post(post_id).await?;
        if !removed {
            return Err(MembershipError::PostNotFound(post_id));
        }

        tracing::info!("Post {post_id} deleted by {}", actor.username);
        Ok(())
    }
}
