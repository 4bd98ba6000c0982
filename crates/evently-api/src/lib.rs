//! Evently API - REST server
//!
//! HTTP endpoints for accounts, events, attendance, reviews, categories and
//! moderation, backed by the storage capabilities from `evently-core`.

pub mod audit;
pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod shutdown;
pub mod state;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use handlers::health;
use openapi::ApiDoc;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// CORS for the configured origins. No origins: permissive in development,
/// no cross-origin access elsewhere.
fn cors_layer(origins: &[String], development: bool) -> CorsLayer {
    let methods = AllowMethods::list([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ]);
    let headers = AllowHeaders::list([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if origins.is_empty() {
        return if development {
            CorsLayer::new().allow_origin(Any).allow_methods(methods).allow_headers(headers)
        } else {
            CorsLayer::new()
        };
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(methods)
        .allow_headers(headers)
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins, state.config.is_development());

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_handler))
        .nest("/auth", routes::auth_routes())
        .nest("/api", routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// In-memory application for integration tests
#[cfg(feature = "test-utils")]
pub mod testing {
    use super::*;
    use crate::auth::{PasswordConfig, PasswordHasher};
    use evently_core::{AppConfig, AuthConfig, MemoryStore, Repositories};

    pub const TEST_ACCESS_SECRET: &str = "test-access-secret-0123456789abcdef";
    pub const TEST_REFRESH_SECRET: &str = "test-refresh-secret-0123456789abcdef";

    /// State over a fresh [`MemoryStore`] with cheap password hashing
    pub fn test_state() -> Arc<AppState> {
        let config = AppConfig {
            environment: "test".to_string(),
            auth: AuthConfig {
                access_secret: TEST_ACCESS_SECRET.to_string(),
                refresh_secret: TEST_REFRESH_SECRET.to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let repos = Repositories::from_store(Arc::new(MemoryStore::new()));
        let hasher = PasswordHasher::new(PasswordConfig::light()).expect("valid test hasher config");

        Arc::new(AppState::new(config, repos, hasher).expect("metrics registry"))
    }

    /// Router plus a handle on its state, for seeding data
    pub fn create_test_app() -> (Router, Arc<AppState>) {
        let state = test_state();
        (create_router(state.clone()), state)
    }
}

/// Router over an empty in-memory store
#[cfg(feature = "test-utils")]
pub fn create_router_for_testing() -> Router {
    testing::create_test_app().0
}
