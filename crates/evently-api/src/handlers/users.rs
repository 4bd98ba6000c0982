//! Self-service account handlers under `/api/users/me`

use crate::auth::AuthContext;
use crate::error::AppError;
use crate::extract::{PageParams, ValidatedJson};
use crate::services::UpdateProfileRequest;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use evently_core::{EventPage, UserProfile};
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Current user profile", body = UserProfile),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    actor: AuthContext,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.user_service().me(actor).await?))
}

/// Update the caller's profile. The role cannot be changed here.
#[utoipa::path(
    put,
    path = "/api/users/me",
    tag = "users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserProfile),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Email already in use", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    actor: AuthContext,
    ValidatedJson(request): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.user_service().update_me(actor, request).await?))
}

#[utoipa::path(
    delete,
    path = "/api/users/me",
    tag = "users",
    responses((status = 204, description = "Account deleted")),
    security(("bearer_auth" = []))
)]
pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    actor: AuthContext,
) -> Result<StatusCode, AppError> {
    state.user_service().delete_me(actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Events created by the caller, in every moderation state
#[utoipa::path(
    get,
    path = "/api/users/me/created-events",
    tag = "users",
    params(PageParams),
    responses((status = 200, description = "Page of events", body = EventPage)),
    security(("bearer_auth" = []))
)]
pub async fn created_events(
    State(state): State<Arc<AppState>>,
    actor: AuthContext,
    Query(params): Query<PageParams>,
) -> Result<Json<EventPage>, AppError> {
    let page = state
        .user_service()
        .created_events(actor, params.paging()?)
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/api/users/me/attended-events",
    tag = "users",
    params(PageParams),
    responses((status = 200, description = "Page of events", body = EventPage)),
    security(("bearer_auth" = []))
)]
pub async fn attended_events(
    State(state): State<Arc<AppState>>,
    actor: AuthContext,
    Query(params): Query<PageParams>,
) -> Result<Json<EventPage>, AppError> {
    let page = state
        .user_service()
        .attended_events(actor, params.paging()?)
        .await?;
    Ok(Json(page))
}
