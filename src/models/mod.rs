//! Data models
//!
//! This module contains all data structures used throughout the iYKELib backend:
//! - Database entities (User, Category, Book, Tutorial, Rating, Comment, ...)
//! - API request payloads (`*Input`) and response shapes (`*Detail`, `*Item`)
//! - Pagination containers

mod analytics;
mod category;
mod content;
mod course;
mod engagement;
mod pagination;
mod user;

pub use analytics::{
    fill_daily_series, ActivityLog, AnalyticsSummary, DailyCount, RequestStatsSnapshot, SearchTerm,
    TopContent, Totals,
};
pub use category::{Category, CategoryWithCounts, CreateCategoryInput, UpdateCategoryInput};
pub use content::{
    Book, BookDetail, BookListItem, ContentQuery, ContentRef, ContentSort, ContentType,
    CreateBookInput, CreateTutorialInput, Tag, Tutorial, TutorialDetail,
    TutorialLevel, TutorialListItem, UpdateBookInput, UpdateTutorialInput,
};
pub use course::{
    Certificate, CertificateView, Course, CourseDetail, CourseItem, CourseItemProgress,
    CourseProgress, CourseSummary, CreateCourseInput,
};
pub use engagement::{
    build_comment_threads, vote_change, Bookmark, BookmarkItem, BookmarkState, Comment,
    CommentThread, CommentWithAuthor, CreateCommentInput, HistoryEntry, HistoryItem, Rating,
    RatingSummary, RecordProgressInput, VoteChange, VoteInput, VOTE_DISLIKE, VOTE_LIKE,
};
pub use pagination::{ListParams, PagedResult};
pub use user::{
    NewUser, Role, SigninInput, SignupInput, UpdateProfileInput, User, UserProfile, UserRole,
    UserStatus,
};

/// A string column or parameter that does not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct InvalidValue {
    pub kind: &'static str,
    pub value: String,
}

impl InvalidValue {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
