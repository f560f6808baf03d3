mod error;
mod extract;
pub mod handlers;
mod middleware;
mod response;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::db::Database;

pub use error::{ApiError, ApiResult, FieldError};
pub use extract::{ApiPath, ApiQuery, AuthUser, ValidatedJson};
pub use middleware::{rate_limit_middleware, RateLimiter, SecurityConfig};
pub use response::{ApiResponse, CountMeta};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub session_ttl: chrono::Duration,
}

/// Create the router with security settings read from the environment.
pub fn create_router(db: Database) -> Router {
    create_router_with_config(db, SecurityConfig::from_env())
}

pub fn create_router_with_config(db: Database, config: SecurityConfig) -> Router {
    let state = AppState {
        db,
        session_ttl: config.session_ttl,
    };

    let mut credentials = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login));
    if config.auth_rate_limiter.is_some() {
        credentials =
            credentials.layer(from_fn_with_state(config.clone(), rate_limit_middleware));
    }

    let api = Router::new()
        .merge(credentials)
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        // Notes
        .route(
            "/notes",
            get(handlers::notes::list_notes).post(handlers::notes::create_note),
        )
        .route("/notes/pinned", get(handlers::notes::list_pinned_notes))
        // `{note}` is a slug here and a numeric id under /pin; the router
        // needs one parameter name per segment.
        .route(
            "/notes/{note}",
            get(handlers::notes::get_note)
                .patch(handlers::notes::update_note)
                .delete(handlers::notes::delete_note),
        )
        .route("/notes/{note}/pin", patch(handlers::notes::toggle_pin))
        // Categories
        .route(
            "/categories",
            get(handlers::categories::list_categories)
                .post(handlers::categories::create_category),
        )
        .route(
            "/categories/{id}",
            get(handlers::categories::get_category)
                .patch(handlers::categories::update_category)
                .delete(handlers::categories::delete_category),
        )
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(config.cors_layer()),
        )
        .with_state(state)
}
