//! Rating, bookmark and reading-history endpoints
//!
//! - POST /api/ratings - Vote; a repeated vote removes it
//! - GET /api/ratings/{content_type}/{content_id} - Summary (with the caller's vote)
//! - POST /api/bookmarks/toggle, GET /api/bookmarks
//! - GET|DELETE /api/bookmarks/{content_type}/{content_id}
//! - POST|GET|DELETE /api/history

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::common::{content_ref, PageQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::models::{
    BookmarkItem, BookmarkState, ContentRef, HistoryEntry, HistoryItem, PagedResult,
    RatingSummary, RecordProgressInput, VoteInput,
};

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub removed: u64,
}

/// Routes anyone may call
pub fn public_router() -> Router<AppState> {
    Router::new().route("/ratings/{content_type}/{content_id}", get(rating_summary))
}

/// Routes that need a signed-in user
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/ratings", post(vote))
        .route("/bookmarks", get(list_bookmarks))
        .route("/bookmarks/toggle", post(toggle_bookmark))
        .route(
            "/bookmarks/{content_type}/{content_id}",
            get(bookmark_state).delete(remove_bookmark),
        )
        .route("/history", get(list_history).post(record_history).delete(clear_history))
}

/// POST /api/ratings
///
/// Returns the authoritative summary so optimistic clients can reconcile.
async fn vote(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<VoteInput>,
) -> Result<Json<RatingSummary>, ApiError> {
    let summary = state
        .rating_service
        .vote(user.id, body.target(), body.vote)
        .await?;
    Ok(Json(summary))
}

/// GET /api/ratings/{content_type}/{content_id}
async fn rating_summary(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path((content_type, content_id)): Path<(String, i64)>,
) -> Result<Json<RatingSummary>, ApiError> {
    let target = content_ref(&content_type, content_id)?;
    Ok(Json(state.rating_service.summary(target, viewer.id()).await?))
}

/// GET /api/bookmarks
async fn list_bookmarks(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<PagedResult<BookmarkItem>>, ApiError> {
    Ok(Json(
        state
            .bookmark_service
            .list_for_user(user.id, &query.params())
            .await?,
    ))
}

/// POST /api/bookmarks/toggle
async fn toggle_bookmark(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(target): Json<ContentRef>,
) -> Result<Json<BookmarkState>, ApiError> {
    Ok(Json(state.bookmark_service.toggle(user.id, target).await?))
}

/// GET /api/bookmarks/{content_type}/{content_id}
async fn bookmark_state(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((content_type, content_id)): Path<(String, i64)>,
) -> Result<Json<BookmarkState>, ApiError> {
    let target = content_ref(&content_type, content_id)?;
    let bookmarked = state.bookmark_service.is_bookmarked(user.id, target).await?;
    Ok(Json(BookmarkState {
        content_type: target.content_type,
        content_id: target.content_id,
        bookmarked,
    }))
}

/// DELETE /api/bookmarks/{content_type}/{content_id}
async fn remove_bookmark(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((content_type, content_id)): Path<(String, i64)>,
) -> Result<Json<BookmarkState>, ApiError> {
    let target = content_ref(&content_type, content_id)?;
    Ok(Json(state.bookmark_service.remove(user.id, target).await?))
}

/// POST /api/history
async fn record_history(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<RecordProgressInput>,
) -> Result<Json<HistoryEntry>, ApiError> {
    Ok(Json(state.history_service.record(user.id, body).await?))
}

/// GET /api/history
async fn list_history(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<PagedResult<HistoryItem>>, ApiError> {
    Ok(Json(
        state
            .history_service
            .list_for_user(user.id, &query.params())
            .await?,
    ))
}

/// DELETE /api/history
async fn clear_history(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<ClearedResponse>, ApiError> {
    let removed = state.history_service.clear(user.id).await?;
    Ok(Json(ClearedResponse { removed }))
}
