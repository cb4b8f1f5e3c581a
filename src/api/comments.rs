//! Comment API endpoints
//!
//! - GET /api/comments/{content_type}/{content_id} - Threaded comments
//! - POST /api/comments/{content_type}/{content_id} - Comment or reply (`parent_id`)
//! - PUT /api/comments/{id} - Edit (author only)
//! - DELETE /api/comments/{id} - Delete with replies (author or admin)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{content_ref, SuccessResponse};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Comment, CommentThread, CreateCommentInput};

#[derive(Debug, Serialize)]
pub struct CommentsResponse {
    pub comments: Vec<CommentThread>,
    /// Top-level comments and replies together
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub body: String,
}

// `{key}` is the content type in item routes and the comment id in the
// others; the router needs one name per segment.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/comments/{key}/{content_id}", get(list_comments))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/comments/{key}/{content_id}", post(create_comment))
        .route("/comments/{key}", put(update_comment).delete(delete_comment))
}

/// GET /api/comments/{content_type}/{content_id}
async fn list_comments(
    State(state): State<AppState>,
    Path((content_type, content_id)): Path<(String, i64)>,
) -> Result<Json<CommentsResponse>, ApiError> {
    let target = content_ref(&content_type, content_id)?;
    let comments = state.comment_service.list_threaded(target).await?;
    let total = comments.iter().map(CommentThread::count).sum();
    Ok(Json(CommentsResponse { comments, total }))
}

/// POST /api/comments/{content_type}/{content_id}
async fn create_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((content_type, content_id)): Path<(String, i64)>,
    Json(body): Json<CreateCommentInput>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let target = content_ref(&content_type, content_id)?;
    let comment = state.comment_service.create(&user, target, body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// PUT /api/comments/{id}
async fn update_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(state.comment_service.update(&user, id, &body.body).await?))
}

/// DELETE /api/comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.comment_service.delete(&user, id).await?;
    Ok(Json(SuccessResponse::ok()))
}
