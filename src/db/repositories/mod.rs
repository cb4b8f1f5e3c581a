//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one aggregate and works with
//! either database driver through [`crate::db::DatabasePool`].

pub mod analytics;
pub mod book;
pub mod bookmark;
pub mod category;
pub mod comment;
pub mod content;
pub mod course;
pub mod history;
pub mod rating;
pub mod tag;
pub mod tutorial;
pub mod user;

pub use analytics::{AnalyticsRepository, ClientInfo, EventLog, SqlxAnalyticsRepository};
pub use book::{BookRepository, SqlxBookRepository};
pub use bookmark::{BookmarkRepository, SqlxBookmarkRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use content::{ContentFilter, ContentRepository, SqlxContentRepository};
pub use course::{CourseRepository, NewCourse, SqlxCourseRepository};
pub use history::{HistoryRepository, SqlxHistoryRepository};
pub use rating::{RatingRepository, SqlxRatingRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use tutorial::{NewTutorial, SqlxTutorialRepository, TutorialRepository};
pub use user::{SqlxUserRepository, UserRepository};
