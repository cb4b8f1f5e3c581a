//! Tutorial API endpoints
//!
//! - GET /api/tutorials - Paginated, filterable list (`level` supported)
//! - GET /api/tutorials/featured - Hero slider items
//! - GET /api/tutorials/{id} - Detail with category, tags and rating
//! - GET /api/tutorials/{id}/thumbnail - Redirect to the thumbnail
//! - POST /api/tutorials/{id}/view - Count a view
//! - POST /api/tutorials, PUT|DELETE /api/tutorials/{id} - Editors and admins

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::books::{FeaturedQuery, ViewResponse};
use crate::api::common::{log_activity, SuccessResponse};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser, RequestClient};
use crate::models::{
    ContentQuery, ContentRef, CreateTutorialInput, PagedResult, TutorialDetail, TutorialListItem,
    UpdateTutorialInput,
};
use crate::services::youtube_thumbnail_url;

/// Build the public tutorials router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tutorials", get(list_tutorials))
        .route("/tutorials/featured", get(featured_tutorials))
        .route("/tutorials/{id}", get(get_tutorial))
        .route("/tutorials/{id}/thumbnail", get(tutorial_thumbnail))
        .route("/tutorials/{id}/view", post(view_tutorial))
}

/// Tutorial management routes (editor middleware applied by the caller)
pub fn editor_router() -> Router<AppState> {
    Router::new()
        .route("/tutorials", post(create_tutorial))
        .route("/tutorials/{id}", put(update_tutorial).delete(delete_tutorial))
}

/// GET /api/tutorials
async fn list_tutorials(
    State(state): State<AppState>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<PagedResult<TutorialListItem>>, ApiError> {
    Ok(Json(state.tutorial_service.list(&query).await?))
}

/// GET /api/tutorials/featured
async fn featured_tutorials(
    State(state): State<AppState>,
    Query(query): Query<FeaturedQuery>,
) -> Result<Json<Vec<TutorialListItem>>, ApiError> {
    Ok(Json(state.tutorial_service.featured(query.limit()).await?))
}

/// GET /api/tutorials/{id}
async fn get_tutorial(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<TutorialDetail>, ApiError> {
    Ok(Json(state.tutorial_service.get(id, viewer.id()).await?))
}

/// GET /api/tutorials/{id}/thumbnail
///
/// Stored thumbnail first, then the YouTube still, then the placeholder.
async fn tutorial_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let tutorial = state.tutorial_service.get_tutorial(id).await?;
    let location = tutorial
        .thumbnail
        .filter(|url| !url.trim().is_empty())
        .or_else(|| {
            Some(tutorial.youtube_id.trim())
                .filter(|yt| !yt.is_empty())
                .map(youtube_thumbnail_url)
        })
        .unwrap_or_else(|| state.uploads.config().placeholder_image.clone());
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]))
}

/// POST /api/tutorials/{id}/view
async fn view_tutorial(
    State(state): State<AppState>,
    client: RequestClient,
    Path(id): Path<i64>,
) -> Result<Json<ViewResponse>, ApiError> {
    let counted = state
        .analytics_service
        .record_view(ContentRef::tutorial(id), &client.0)
        .await?;
    Ok(Json(ViewResponse { counted }))
}

/// POST /api/tutorials
async fn create_tutorial(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateTutorialInput>,
) -> Result<(StatusCode, Json<TutorialDetail>), ApiError> {
    let tutorial = state.tutorial_service.create(body, Some(user.id)).await?;
    log_activity(
        &state,
        user.id,
        "create",
        "tutorial",
        Some(tutorial.tutorial.id),
        Some(&tutorial.tutorial.title),
    )
    .await;
    Ok((StatusCode::CREATED, Json(tutorial)))
}

/// PUT /api/tutorials/{id}
async fn update_tutorial(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateTutorialInput>,
) -> Result<Json<TutorialDetail>, ApiError> {
    let tutorial = state.tutorial_service.update(id, body).await?;
    log_activity(&state, user.id, "update", "tutorial", Some(id), Some(&tutorial.tutorial.title)).await;
    Ok(Json(tutorial))
}

/// DELETE /api/tutorials/{id}
async fn delete_tutorial(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.tutorial_service.delete(id).await?;
    log_activity(&state, user.id, "delete", "tutorial", Some(id), None).await;
    Ok(Json(SuccessResponse::ok()))
}
