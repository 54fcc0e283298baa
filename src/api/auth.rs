use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, LoginRequest, MessageResponse, RegisterRequest, UserDto};
use crate::models::UserRole;

pub(super) const SESSION_USER_KEY: &str = "user";

/// Authenticated identity attached to the request by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
    pub role: UserRole,
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the session cookie into a [`CurrentUser`] request extension.
/// Requests without a live session are rejected with 401.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let Ok(Some(username)) = session.get::<String>(SESSION_USER_KEY).await else {
        return Err(ApiError::Unauthorized("Not authenticated".to_string()));
    };

    // The role is read fresh from the store so a promotion or deletion
    // takes effect without waiting for the session to expire.
    let user = match state.auth.get_user(&username).await {
        Ok(user) => user,
        Err(_) => {
            let _ = session.flush().await;
            return Err(ApiError::Unauthorized("Not authenticated".to_string()));
        }
    };

    tracing::Span::current().record("user_id", &user.username);

    request.extensions_mut().insert(CurrentUser {
        username: user.username,
        role: UserRole::parse(&user.role),
    });

    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /login
/// Authenticate with username and password, establishes a session cookie
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    if payload.username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let user = state.auth.login(&payload.username, &payload.password).await?;

    if let Err(e) = session.insert(SESSION_USER_KEY, &user.username).await {
        return Err(ApiError::internal(format!("Failed to create session: {e}")));
    }

    Ok(Json(ApiResponse::success(user.into())))
}

/// POST /logout
/// Invalidate the current session
pub async fn logout(session: Session) -> Json<ApiResponse<MessageResponse>> {
    let _ = session.flush().await;
    Json(ApiResponse::success(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

/// POST /register
/// Create a new account with the default role
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .auth
        .register(&payload.username, &payload.email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserDto::from(user))),
    ))
}

/// GET /users/me
/// Get current user information (requires authentication)
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    axum::Extension(current): axum::Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = state.auth.get_user(&current.username).await?;
    Ok(Json(ApiResponse::success(user.into())))
}
