//! API route definitions

use crate::auth::{authenticate, require_role, MODERATOR_ROLES};
use crate::handlers::{auth, categories, events, moderation, reviews, users};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;

/// Public token endpoints
pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::login_handler))
        .route("/refresh", post(auth::refresh_handler))
}

/// Moderator-only routes. The role gate runs after authentication.
fn moderation_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/:id", patch(moderation::moderate_event))
        .route("/users", post(moderation::create_user))
        .route(
            "/users/:id",
            get(moderation::get_user)
                .put(moderation::update_user)
                .delete(moderation::delete_user),
        )
        .route("/categories", post(categories::create_category))
        .route(
            "/categories/:id",
            put(categories::update_category).delete(categories::delete_category),
        )
        .route_layer(middleware::from_fn(require_role(MODERATOR_ROLES)))
}

/// Everything under `/api`; every route requires a valid access token
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        // Events
        .route("/events", post(events::create_event).get(events::list_events))
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:id/participants", get(events::list_participants))
        .route(
            "/events/:id/attendance",
            post(events::attend_event).delete(events::cancel_attendance),
        )
        .route(
            "/events/:id/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        // Own account
        .route(
            "/users/me",
            get(users::get_me).put(users::update_me).delete(users::delete_me),
        )
        .route("/users/me/created-events", get(users::created_events))
        .route("/users/me/attended-events", get(users::attended_events))
        // Categories
        .route("/categories", get(categories::list_categories))
        .route("/categories/:id", get(categories::get_category))
        .nest("/moderation", moderation_routes())
        .layer(middleware::from_fn_with_state(state, authenticate))
}
