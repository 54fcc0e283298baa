use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::{validate_limit, validate_post_id, validate_username};
use super::{
    ApiError, ApiResponse, AppState, CreatePostRequest, JoinRequest, ListPostsQuery,
    MessageResponse, PageQuery, PostDto,
};
use crate::models::validate_new_post;
use crate::services::Actor;

impl AppState {
    async fn post_with_members(&self, post: crate::entities::posts::Model) -> Result<PostDto, ApiError> {
        let members = self.store.list_members(post.id).await?;
        Ok(PostDto::from_model(post, Some(members)))
    }
}

fn actor_for(current: &CurrentUser) -> Actor {
    Actor::new(current.username.clone(), current.role)
}

/// POST /posts
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_post = validate_new_post(
        &payload.origin,
        &payload.destination,
        &payload.departure_at,
        payload.capacity,
        Utc::now(),
    )?;

    let post = state.store.create_post(&current.username, &new_post).await?;

    tracing::info!(
        "Post {} created by {} ({} -> {})",
        post.id,
        current.username,
        post.origin,
        post.destination
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(PostDto::from(post))),
    ))
}

/// GET /posts?skip&limit&owner
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<ApiResponse<Vec<PostDto>>>, ApiError> {
    let limit = validate_limit(query.limit)?;

    let posts = state
        .store
        .list_posts(query.owner.as_deref(), query.skip, limit)
        .await?;
    let posts = posts.into_iter().map(PostDto::from).collect();

    Ok(Json(ApiResponse::success(posts)))
}

/// GET /{post_id}/post
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i32>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let post_id = validate_post_id(post_id)?;

    let post = state
        .store
        .get_post(post_id)
        .await?
        .ok_or_else(|| ApiError::post_not_found(post_id))?;

    Ok(Json(ApiResponse::success(
        state.post_with_members(post).await?,
    )))
}

/// GET /{post_id}/posts
/// All posts published by the owner of post {post_id}
pub async fn list_owner_posts(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i32>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<PostDto>>>, ApiError> {
    let post_id = validate_post_id(post_id)?;
    let limit = validate_limit(query.limit)?;

    let post = state
        .store
        .get_post(post_id)
        .await?
        .ok_or_else(|| ApiError::post_not_found(post_id))?;

    let posts = state
        .store
        .list_posts(Some(&post.owner_username), query.skip, limit)
        .await?;
    let posts = posts.into_iter().map(PostDto::from).collect();

    Ok(Json(ApiResponse::success(posts)))
}

/// POST /{post_id}/members
/// Claim a seat. The body is optional; without it the session user joins.
pub async fn join_post(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(post_id): Path<i32>,
    payload: Option<Json<JoinRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = validate_post_id(post_id)?;

    let username = payload
        .and_then(|Json(body)| body.username)
        .unwrap_or_else(|| current.username.clone());
    let username = validate_username(&username)?.to_string();

    if username != current.username && !current.role.is_admin() {
        return Err(ApiError::forbidden(
            "Only an admin may add another user to a post",
        ));
    }

    let post = state.membership.join(post_id, &username).await?;

    tracing::info!("{} joined post {}", username, post_id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(state.post_with_members(post).await?)),
    ))
}

/// DELETE /{post_id}/members/{username}
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path((post_id, username)): Path<(i32, String)>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let post_id = validate_post_id(post_id)?;
    let username = validate_username(&username)?.to_string();

    let post = state
        .membership
        .remove_member(post_id, &username, &actor_for(&current))
        .await?;

    tracing::info!("{} removed from post {}", username, post_id);

    Ok(Json(ApiResponse::success(
        state.post_with_members(post).await?,
    )))
}

/// POST /{post_id}/cancel
pub async fn cancel_post(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(post_id): Path<i32>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let post_id = validate_post_id(post_id)?;

    let post = state
        .membership
        .cancel(post_id, &actor_for(&current))
        .await?;

    Ok(Json(ApiResponse::success(
        state.post_with_members(post).await?,
    )))
}

/// DELETE /{post_id}/post
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(post_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let post_id = validate_post_id(post_id)?;

    state
        .membership
        .delete_post(post_id, &actor_for(&current))
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: format!("Post {} deleted", post_id),
    })))
}
