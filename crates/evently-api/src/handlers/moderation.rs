//! Moderator-only handlers: event decisions and user management.
//!
//! Mounted behind the role gate; every handler can assume the caller holds
//! a moderator role.

use crate::auth::AuthContext;
use crate::error::AppError;
use crate::extract::{parse_id, ValidatedJson};
use crate::services::{AdminUpdateUserRequest, CreateUserRequest, ModerateEventRequest};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use evently_core::{Event, UserProfile};
use std::sync::Arc;

/// Approve or reject a pending event
#[utoipa::path(
    patch,
    path = "/api/moderation/events/{id}",
    tag = "moderation",
    params(("id" = Uuid, Path, description = "Event id")),
    request_body = ModerateEventRequest,
    responses(
        (status = 200, description = "Event after the decision", body = Event),
        (status = 403, description = "Moderator role required", body = crate::error::ApiError),
        (status = 404, description = "Event not found", body = crate::error::ApiError),
        (status = 409, description = "Event already moderated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn moderate_event(
    State(state): State<Arc<AppState>>,
    moderator: AuthContext,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<ModerateEventRequest>,
) -> Result<Json<Event>, AppError> {
    let id = parse_id(&id, "event")?;
    let event = state
        .moderation_service()
        .check_event(moderator, id, request.status)
        .await?;
    state.metrics.record_moderation(event.status.as_str());
    Ok(Json(event))
}

#[utoipa::path(
    post,
    path = "/api/moderation/users",
    tag = "moderation",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserProfile),
        (status = 409, description = "Email already registered", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    moderator: AuthContext,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.user_service().create_user(moderator, request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/api/moderation/users/{id}",
    tag = "moderation",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserProfile),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    let id = parse_id(&id, "user")?;
    Ok(Json(state.user_service().get(id).await?))
}

/// Update any account, including its role
#[utoipa::path(
    put,
    path = "/api/moderation/users/{id}",
    tag = "moderation",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = AdminUpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = UserProfile),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    moderator: AuthContext,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<AdminUpdateUserRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let id = parse_id(&id, "user")?;
    Ok(Json(
        state.user_service().update_user(moderator, id, request).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/moderation/users/{id}",
    tag = "moderation",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    moderator: AuthContext,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "user")?;
    state.user_service().delete_user(moderator, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
