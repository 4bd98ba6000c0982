//! Category handlers. Reads are open to any authenticated user; writes are
//! mounted under the moderation routes.

use crate::error::AppError;
use crate::extract::{parse_id, ValidatedJson};
use crate::services::CategoryRequest;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use evently_core::Category;
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/categories",
    tag = "categories",
    responses((status = 200, description = "All categories by name", body = [Category])),
    security(("bearer_auth" = []))
)]
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.category_service().list().await?))
}

#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    tag = "categories",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category", body = Category),
        (status = 404, description = "Category not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Category>, AppError> {
    let id = parse_id(&id, "category")?;
    Ok(Json(state.category_service().get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/moderation/categories",
    tag = "moderation",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 403, description = "Moderator role required", body = crate::error::ApiError),
        (status = 409, description = "Name already taken", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let category = state.category_service().create(request).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    put,
    path = "/api/moderation/categories/{id}",
    tag = "moderation",
    params(("id" = Uuid, Path, description = "Category id")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category renamed", body = Category),
        (status = 404, description = "Category not found", body = crate::error::ApiError),
        (status = 409, description = "Name already taken", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<CategoryRequest>,
) -> Result<Json<Category>, AppError> {
    let id = parse_id(&id, "category")?;
    Ok(Json(state.category_service().update(id, request).await?))
}

#[utoipa::path(
    delete,
    path = "/api/moderation/categories/{id}",
    tag = "moderation",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found", body = crate::error::ApiError),
        (status = 409, description = "Category still used by events", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "category")?;
    state.category_service().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
