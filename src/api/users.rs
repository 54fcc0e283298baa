use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::{CurrentUser, SESSION_USER_KEY};
use super::validation::{validate_limit, validate_user_id};
use super::{
    ApiError, ApiResponse, AppState, CreateItemRequest, ItemDto, PageQuery, UpdateUserRequest,
    UserDto,
};
use crate::db::User;

/// Only the account holder or an admin may modify or delete an account.
fn ensure_self_or_admin(current: &CurrentUser, target: &User) -> Result<(), ApiError> {
    if current.username == target.username || current.role.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Only the account holder or an admin may do this",
        ))
    }
}

/// GET /users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    let limit = validate_limit(query.limit)?;

    let users = state.store.list_users(query.skip, limit).await?;
    let users = users.into_iter().map(UserDto::from).collect();

    Ok(Json(ApiResponse::success(users)))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let id = validate_user_id(id)?;

    let user = state
        .store
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::user_not_found(id))?;

    Ok(Json(ApiResponse::success(user.into())))
}

/// PUT /users/{id}
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    session: Session,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let id = validate_user_id(id)?;

    let target = state
        .store
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::user_not_found(id))?;
    ensure_self_or_admin(&current, &target)?;

    if let Some(username) = payload.username.as_deref() {
        super::validation::validate_username(username)?;
        if let Some(existing) = state.store.get_user_by_username(username).await?
            && existing.id != id
        {
            return Err(ApiError::Conflict(format!(
                "Username '{}' is already taken",
                username
            )));
        }
    }
    if let Some(email) = payload.email.as_deref() {
        if !email.contains('@') {
            return Err(ApiError::validation("Invalid email address"));
        }
        if let Some(existing) = state.store.get_user_by_email(email).await?
            && existing.id != id
        {
            return Err(ApiError::Conflict(format!(
                "Email '{}' is already taken",
                email
            )));
        }
    }

    let user = state
        .store
        .update_user(id, payload.username.as_deref(), payload.email.as_deref())
        .await?
        .ok_or_else(|| ApiError::user_not_found(id))?;

    // A self-rename rekeys the session so the cookie keeps resolving
    if current.username == target.username && user.username != current.username {
        if let Err(e) = session.insert(SESSION_USER_KEY, &user.username).await {
            return Err(ApiError::internal(format!("Failed to update session: {e}")));
        }
    }

    Ok(Json(ApiResponse::success(user.into())))
}

/// DELETE /users/{id}
/// Removes the account along with its items, posts, and memberships
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let id = validate_user_id(id)?;

    let target = state
        .store
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::user_not_found(id))?;
    ensure_self_or_admin(&current, &target)?;

    let deleted = state
        .store
        .delete_user(id)
        .await?
        .ok_or_else(|| ApiError::user_not_found(id))?;

    tracing::info!("User {} deleted by {}", deleted.username, current.username);

    Ok(Json(ApiResponse::success(deleted.into())))
}

/// POST /users/{id}/items
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = validate_user_id(id)?;

    if payload.name.trim().is_empty() {
        return Err(ApiError::validation("Item name cannot be empty"));
    }
    if payload.price < 0.0 {
        return Err(ApiError::validation("Item price cannot be negative"));
    }

    let target = state
        .store
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::user_not_found(id))?;
    ensure_self_or_admin(&current, &target)?;

    let item = state
        .store
        .create_item(
            id,
            payload.name.trim(),
            payload.description.as_deref(),
            payload.price,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(ItemDto::from(item))),
    ))
}

/// GET /users/{id}/items
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<ItemDto>>>, ApiError> {
    let id = validate_user_id(id)?;

    state
        .store
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::user_not_found(id))?;

    let items = state.store.list_items_for_user(id).await?;
    let items = items.into_iter().map(ItemDto::from).collect();

    Ok(Json(ApiResponse::success(items)))
}
