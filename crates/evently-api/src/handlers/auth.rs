//! Authentication API handlers
//!
//! Public endpoints that issue token pairs.

use crate::audit::AuditContext;
use crate::auth::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest};
use crate::error::AppError;
use crate::extract::ValidatedJson;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

fn outcome<T>(result: &Result<T, AppError>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "failure"
    }
}

/// Register a new user account
///
/// New users always receive the `USER` role; a role in the body is ignored.
///
/// # Responses
///
/// * `201 Created` - Account created, token pair issued
/// * `400 Bad Request` - Invalid input
/// * `409 Conflict` - Email already registered
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Email already registered", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = AuditContext::from_headers(&headers);
    let result = state.auth_service().register(request, &ctx).await;
    state.metrics.record_auth("register", outcome(&result));

    Ok((StatusCode::CREATED, Json(result?)))
}

/// Login with email and password
///
/// Unknown email and wrong password produce the same response.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let ctx = AuditContext::from_headers(&headers);
    let result = state.auth_service().login(request, &ctx).await;
    state.metrics.record_auth("login", outcome(&result));

    Ok(Json(result?))
}

/// Refresh access token
///
/// Always issues a new access token. The refresh token is replaced only
/// when it is close to expiry; otherwise the same string is returned.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed successfully", body = AuthResponse),
        (status = 401, description = "Invalid or expired refresh token", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let ctx = AuditContext::from_headers(&headers);
    let result = state.auth_service().refresh(request, &ctx);
    state.metrics.record_auth("refresh", outcome(&result));

    Ok(Json(result?))
}
