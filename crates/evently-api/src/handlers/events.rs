//! Event handlers
//!
//! Listing and single reads apply the visibility rule; update and delete
//! are restricted to the creator or a moderator.

use crate::auth::AuthContext;
use crate::error::AppError;
use crate::extract::{parse_id, PageParams, ValidatedJson};
use crate::services::{CreateEventRequest, UpdateEventRequest};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use evently_core::{Event, EventPage, ParticipantPage};
use std::sync::Arc;

/// Create an event
///
/// The caller becomes the creator. New events start `pending` and are
/// hidden from other users until a moderator approves them.
#[utoipa::path(
    post,
    path = "/api/events",
    tag = "events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = Event),
        (status = 400, description = "Invalid input or unknown category", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    actor: AuthContext,
    ValidatedJson(request): ValidatedJson<CreateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    let event = state.event_service().create(actor, request).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// List events
///
/// Moderators see every status, everyone else only approved events.
#[utoipa::path(
    get,
    path = "/api/events",
    tag = "events",
    params(PageParams),
    responses(
        (status = 200, description = "Page of events", body = EventPage),
        (status = 400, description = "Malformed paging parameters", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    actor: AuthContext,
    Query(params): Query<PageParams>,
) -> Result<Json<EventPage>, AppError> {
    let page = state.event_service().list(actor, params.paging()?).await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/api/events/{id}",
    tag = "events",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event", body = Event),
        (status = 404, description = "Event not found or not visible", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    actor: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<Event>, AppError> {
    let id = parse_id(&id, "event")?;
    Ok(Json(state.event_service().get(actor, id).await?))
}

/// Update an event
///
/// Partial update. A caller who is neither the creator nor a moderator gets
/// the same 404 as for a missing event.
#[utoipa::path(
    put,
    path = "/api/events/{id}",
    tag = "events",
    params(("id" = Uuid, Path, description = "Event id")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Updated event", body = Event),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 404, description = "Event not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_event(
    State(state): State<Arc<AppState>>,
    actor: AuthContext,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateEventRequest>,
) -> Result<Json<Event>, AppError> {
    let id = parse_id(&id, "event")?;
    Ok(Json(state.event_service().update(actor, id, request).await?))
}

#[utoipa::path(
    delete,
    path = "/api/events/{id}",
    tag = "events",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 404, description = "Event not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    actor: AuthContext,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "event")?;
    state.event_service().delete(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/events/{id}/participants",
    tag = "events",
    params(("id" = Uuid, Path, description = "Event id"), PageParams),
    responses(
        (status = 200, description = "Page of participants", body = ParticipantPage),
        (status = 404, description = "Event not found or not visible", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_participants(
    State(state): State<Arc<AppState>>,
    actor: AuthContext,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<ParticipantPage>, AppError> {
    let id = parse_id(&id, "event")?;
    let page = state
        .event_service()
        .participants(actor, id, params.paging()?)
        .await?;
    Ok(Json(page))
}

/// Attend an approved event
#[utoipa::path(
    post,
    path = "/api/events/{id}/attendance",
    tag = "attendance",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 204, description = "Attending"),
        (status = 404, description = "Event not found or not visible", body = crate::error::ApiError),
        (status = 409, description = "Already attending or event not approved", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn attend_event(
    State(state): State<Arc<AppState>>,
    actor: AuthContext,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "event")?;
    state.event_service().attend(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/events/{id}/attendance",
    tag = "attendance",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 204, description = "Attendance cancelled"),
        (status = 404, description = "Not attending this event", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel_attendance(
    State(state): State<Arc<AppState>>,
    actor: AuthContext,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "event")?;
    state.event_service().cancel_attendance(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
