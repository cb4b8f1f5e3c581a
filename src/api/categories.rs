//! Category API endpoints
//!
//! - GET /api/categories - All categories with book and tutorial counts
//! - GET /api/categories/{id_or_slug} - One category
//! - POST /api/categories, PUT|DELETE /api/categories/{id} - Editors and admins

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::common::{log_activity, SuccessResponse};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Category, CategoryWithCounts, CreateCategoryInput, UpdateCategoryInput};

/// Build the public categories router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/{id}", get(get_category))
}

/// Category management routes (editor middleware applied by the caller)
pub fn editor_router() -> Router<AppState> {
    Router::new()
        .route("/categories", post(create_category))
        .route("/categories/{id}", put(update_category).delete(delete_category))
}

/// GET /api/categories
async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryWithCounts>>, ApiError> {
    Ok(Json(state.category_service.list().await?))
}

/// GET /api/categories/{id_or_slug}
async fn get_category(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.get_by_id_or_slug(&key).await?))
}

/// POST /api/categories
async fn create_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateCategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.category_service.create(body).await?;
    log_activity(&state, user.id, "create", "category", Some(category.id), Some(&category.name)).await;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    let category = state.category_service.update(id, body).await?;
    log_activity(&state, user.id, "update", "category", Some(id), Some(&category.name)).await;
    Ok(Json(category))
}

/// DELETE /api/categories/{id}
///
/// Refused with 409 while books or tutorials still use the category.
async fn delete_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.category_service.delete(id).await?;
    log_activity(&state, user.id, "delete", "category", Some(id), None).await;
    Ok(Json(SuccessResponse::ok()))
}
