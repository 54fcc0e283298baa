use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::User;
use crate::entities::{items, posts};
use crate::models::PostStatus;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemDto {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub owner_id: i32,
}

impl From<items::Model> for ItemDto {
    fn from(item: items::Model) -> Self {
        Self {
            id: item.id,
            name: item.name,
            description: item.description,
            price: item.price,
            owner_id: item.owner_id,
        }
    }
}

/// Post as seen over the wire. The `status` field carries the derived
/// lifecycle state, not the raw persisted value.
#[derive(Debug, Serialize)]
pub struct PostDto {
    pub id: i32,
    pub owner_username: String,
    pub origin: String,
    pub destination: String,
    pub departure_at: String,
    pub capacity: i32,
    pub engaged_count: i32,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
}

impl PostDto {
    pub fn from_model(post: posts::Model, members: Option<Vec<String>>) -> Self {
        let status = PostStatus::derive(
            &post.status,
            post.engaged_count,
            post.capacity,
            &post.departure_at,
            Utc::now(),
        );
        Self {
            id: post.id,
            owner_username: post.owner_username,
            origin: post.origin,
            destination: post.destination,
            departure_at: post.departure_at,
            capacity: post.capacity,
            engaged_count: post.engaged_count,
            status: status.value().to_string(),
            created_at: post.created_at,
            updated_at: post.updated_at,
            members,
        }
    }
}

impl From<posts::Model> for PostDto {
    fn from(post: posts::Model) -> Self {
        Self::from_model(post, None)
    }
}

/// Value/label pair for frontend select widgets.
#[derive(Debug, Serialize)]
pub struct OptionDto {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub origin: String,
    pub destination: String,
    pub departure_at: String,
    pub capacity: i32,
}

/// Body for joining a post. `username` defaults to the session user.
#[derive(Debug, Default, Deserialize)]
pub struct JoinRequest {
    pub username: Option<String>,
}

fn default_limit() -> u64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub owner: Option<String>,
}
