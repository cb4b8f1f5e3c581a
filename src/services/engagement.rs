//! Shared error type and existence check for reader engagement services

use crate::db::repositories::ContentRepository;
use crate::models::ContentRef;

#[derive(Debug, thiserror::Error)]
pub enum EngagementError {
    #[error("{0} not found")]
    ContentNotFound(ContentRef),

    #[error("Comment not found: {0}")]
    CommentNotFound(i64),

    #[error("Invalid vote {0}: use 1 (like) or -1 (dislike)")]
    InvalidVote(i32),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Engagement rows may only point at existing items
pub(crate) async fn ensure_content_exists(
    content: &dyn ContentRepository,
    target: ContentRef,
) -> Result<(), EngagementError> {
    if content.exists(target).await? {
        Ok(())
    } else {
        Err(EngagementError::ContentNotFound(target))
    }
}
