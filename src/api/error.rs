use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::models::ValidationError;
use crate::services::{AuthError, MembershipError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    DatabaseError(String),

    ValidationError(String),

    Conflict(String),

    Forbidden(String),

    CapacityExceeded(String),

    InvalidState(String),

    InternalError(String),

    Unauthorized(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::CapacityExceeded(msg) => write!(f, "Capacity exceeded: {}", msg),
            ApiError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            ApiError::ValidationError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::CapacityExceeded(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::InvalidState(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid credentials".to_string())
            }
            AuthError::UserNotFound => ApiError::NotFound("User not found".to_string()),
            AuthError::Conflict(msg) => ApiError::Conflict(msg),
            AuthError::Validation(msg) => ApiError::ValidationError(msg),
            AuthError::Database(msg) => ApiError::DatabaseError(msg),
            AuthError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<MembershipError> for ApiError {
    fn from(err: MembershipError) -> Self {
        match err {
            MembershipError::PostNotFound(id) => ApiError::post_not_found(id),
            MembershipError::UserNotFound(username) => {
                ApiError::NotFound(format!("User '{}' not found", username))
            }
            MembershipError::OwnerCannotJoin => {
                ApiError::Forbidden("The post owner cannot join their own post".to_string())
            }
            MembershipError::AlreadyMember => {
                ApiError::Conflict("User is already a member of this post".to_string())
            }
            MembershipError::CapacityExceeded => {
                ApiError::CapacityExceeded("The post has no free seats".to_string())
            }
            MembershipError::NoSuchMembership => {
                ApiError::NotFound("User is not a member of this post".to_string())
            }
            MembershipError::NotAcceptingChanges(status) => ApiError::InvalidState(format!(
                "Post is {} and no longer accepts membership changes",
                status.value()
            )),
            MembershipError::Forbidden(msg) => ApiError::Forbidden(msg),
            MembershipError::Database(msg) => ApiError::DatabaseError(msg),
        }
    }
}

impl ApiError {
    pub fn post_not_found(id: i32) -> Self {
        ApiError::NotFound(format!("Post {} not found", id))
    }

    pub fn user_not_found(id: i32) -> Self {
        ApiError::NotFound(format!("User {} not found", id))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::ValidationError(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::InternalError(msg.into())
    }
}
