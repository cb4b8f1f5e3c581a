//! Reader engagement: ratings, bookmarks, comments and reading history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentRef, ContentType};

/// Thumbs up
pub const VOTE_LIKE: i32 = 1;
/// Thumbs down
pub const VOTE_DISLIKE: i32 = -1;

/// One user's vote on one item
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Rating {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(try_from = "String")]
    pub content_type: ContentType,
    pub content_id: i64,
    /// `1` or `-1`
    pub vote: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Authoritative vote totals for an item, returned after every vote so the
/// client can reconcile its optimistic state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub content_type: ContentType,
    pub content_id: i64,
    pub likes: i64,
    pub dislikes: i64,
    /// `likes - dislikes`
    pub score: i64,
    /// The caller's current vote, when signed in and voted
    pub user_vote: Option<i32>,
}

impl RatingSummary {
    pub fn new(target: ContentRef, likes: i64, dislikes: i64, user_vote: Option<i32>) -> Self {
        Self {
            content_type: target.content_type,
            content_id: target.content_id,
            likes,
            dislikes,
            score: likes - dislikes,
            user_vote,
        }
    }
}

/// Body of `POST /api/ratings`
#[derive(Debug, Clone, Deserialize)]
pub struct VoteInput {
    pub content_type: ContentType,
    pub content_id: i64,
    pub vote: i32,
}

impl VoteInput {
    pub fn target(&self) -> ContentRef {
        ContentRef::new(self.content_type, self.content_id)
    }
}

/// Outcome of applying a vote against the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    Insert,
    Remove,
    Switch,
}

/// Toggle rule: same vote again removes it, the opposite vote switches it
pub fn vote_change(previous: Option<i32>, vote: i32) -> VoteChange {
    match previous {
        None => VoteChange::Insert,
        Some(prev) if prev == vote => VoteChange::Remove,
        Some(_) => VoteChange::Switch,
    }
}

/// Bookmark row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Bookmark {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(try_from = "String")]
    pub content_type: ContentType,
    pub content_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Bookmark joined with the item it points at
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BookmarkItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub bookmark: Bookmark,
    pub title: Option<String>,
    pub image: Option<String>,
}

/// Result of a bookmark toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BookmarkState {
    pub content_type: ContentType,
    pub content_id: i64,
    pub bookmarked: bool,
}

/// Comment row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(try_from = "String")]
    pub content_type: ContentType,
    pub content_id: i64,
    pub parent_id: Option<i64>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment with the author's public details
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CommentWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub comment: Comment,
    pub username: String,
    pub avatar: Option<String>,
}

/// A comment and its replies, recursively
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: CommentWithAuthor,
    pub replies: Vec<CommentThread>,
}

impl CommentThread {
    /// Number of comments in this thread, including the root
    pub fn count(&self) -> usize {
        1 + self.replies.iter().map(CommentThread::count).sum::<usize>()
    }
}

/// Build reply trees from a flat list ordered by creation time.
///
/// Comments whose parent is not in the list are dropped.
pub fn build_comment_threads(comments: Vec<CommentWithAuthor>) -> Vec<CommentThread> {
    use std::collections::HashMap;

    let mut children: HashMap<Option<i64>, Vec<CommentWithAuthor>> = HashMap::new();
    for comment in comments {
        children
            .entry(comment.comment.parent_id)
            .or_default()
            .push(comment);
    }

    fn attach(
        parent: Option<i64>,
        children: &mut HashMap<Option<i64>, Vec<CommentWithAuthor>>,
    ) -> Vec<CommentThread> {
        let nodes = children.remove(&parent).unwrap_or_default();
        nodes
            .into_iter()
            .map(|comment| {
                let replies = attach(Some(comment.comment.id), children);
                CommentThread { comment, replies }
            })
            .collect()
    }

    attach(None, &mut children)
}

/// Body of `POST /api/comments/{content_type}/{content_id}`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub body: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

/// Reading/watching progress on one item
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HistoryEntry {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(try_from = "String")]
    pub content_type: ContentType,
    pub content_id: i64,
    /// Percentage, 0 to 100
    pub progress: i32,
    /// Page number, chapter anchor or video timestamp
    pub last_position: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// History entry joined with the item it points at
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HistoryItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub entry: HistoryEntry,
    pub title: Option<String>,
    pub image: Option<String>,
}

/// Body of `POST /api/history`
#[derive(Debug, Clone, Deserialize)]
pub struct RecordProgressInput {
    pub content_type: ContentType,
    pub content_id: i64,
    #[serde(default)]
    pub progress: i32,
    #[serde(default)]
    pub last_position: Option<String>,
}
