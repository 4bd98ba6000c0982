//! Review handlers

use crate::auth::AuthContext;
use crate::error::AppError;
use crate::extract::{parse_id, PageParams, ValidatedJson};
use crate::services::CreateReviewRequest;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use evently_core::{Review, ReviewPage};
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/events/{id}/reviews",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Event id"), PageParams),
    responses(
        (status = 200, description = "Page of reviews, newest first", body = ReviewPage),
        (status = 404, description = "Event not found or not visible", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    actor: AuthContext,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<ReviewPage>, AppError> {
    let id = parse_id(&id, "event")?;
    let page = state.review_service().list(actor, id, params.paging()?).await?;
    Ok(Json(page))
}

/// Review an approved event
#[utoipa::path(
    post,
    path = "/api/events/{id}/reviews",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Event id")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 400, description = "Score outside 1-5", body = crate::error::ApiError),
        (status = 404, description = "Event not found or not visible", body = crate::error::ApiError),
        (status = 409, description = "Event not approved", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    actor: AuthContext,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<CreateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "event")?;
    let review = state.review_service().create(actor, id, request).await?;
    Ok((StatusCode::CREATED, Json(review)))
}
