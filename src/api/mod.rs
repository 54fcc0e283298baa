use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use time;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, MembershipService, SeaOrmAuthService, SeaOrmMembershipService,
};

pub mod auth;
mod error;
mod options;
mod posts;
mod types;
mod users;
mod validation;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,

    pub config: Config,

    pub auth: Arc<dyn AuthService>,

    pub membership: Arc<dyn MembershipService>,
}

pub fn create_app_state(store: Store, config: Config) -> Arc<AppState> {
    let auth: Arc<dyn AuthService> = Arc::new(SeaOrmAuthService::new(
        store.clone(),
        config.security.clone(),
    ));
    let membership: Arc<dyn MembershipService> =
        Arc::new(SeaOrmMembershipService::new(store.clone()));

    Arc::new(AppState {
        store,
        config,
        auth,
        membership,
    })
}

pub async fn create_app_state_from_config(config: Config) -> anyhow::Result<Arc<AppState>> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;
    Ok(create_app_state(store, config))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config.server.cors_allowed_origins.clone();

    let protected_routes = create_protected_router(state.clone());

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(state.config.server.secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            state.config.auth.session_ttl_minutes,
        )));

    let app_router = Router::new()
        .merge(protected_routes)
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/register", post(auth::register))
        .route("/posts", get(posts::list_posts))
        .route("/{post_id}/post", get(posts::get_post))
        .route("/capitals-for-select", get(options::capitals_for_select))
        .route(
            "/permissions-for-select",
            get(options::permissions_for_select),
        )
        .layer(session_layer)
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    app_router
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/me", get(auth::get_current_user))
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}", put(users::update_user))
        .route("/users/{id}", delete(users::delete_user))
        .route("/users/{id}/items", post(users::create_item))
        .route("/users/{id}/items", get(users::list_items))
        .route("/posts", post(posts::create_post))
        .route("/{post_id}/posts", get(posts::list_owner_posts))
        .route("/{post_id}/members", post(posts::join_post))
        .route(
            "/{post_id}/members/{username}",
            delete(posts::remove_member),
        )
        .route("/{post_id}/cancel", post(posts::cancel_post))
        .route("/{post_id}/post", delete(posts::delete_post))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
