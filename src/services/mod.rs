//! Services layer - Business logic
//!
//! This module contains all business logic services for the iYKELib backend.
//! Services are responsible for:
//! - Implementing business rules and validation
//! - Coordinating between repositories, the cache and the upload store
//! - Mapping failures to typed errors the API layer turns into responses

pub mod analytics;
pub mod book;
pub mod bookmark;
pub mod category;
pub mod comment;
pub mod content;
pub mod course;
pub mod engagement;
pub mod history;
pub mod password;
pub mod rate_limiter;
pub mod rating;
pub mod search;
pub mod token;
pub mod tutorial;
pub mod upload;
pub mod user;

pub use analytics::{AnalyticsError, AnalyticsService, RequestStats};
pub use book::BookService;
pub use bookmark::BookmarkService;
pub use category::{generate_slug, CategoryService, CategoryServiceError};
pub use comment::CommentService;
pub use content::ContentServiceError;
pub use course::{CourseService, CourseServiceError};
pub use engagement::EngagementError;
pub use history::HistoryService;
pub use password::{hash_password, verify_password};
pub use rate_limiter::LoginRateLimiter;
pub use rating::RatingService;
pub use search::{SearchResults, SearchService};
pub use token::{Claims, TokenError, TokenService};
pub use tutorial::{extract_youtube_id, youtube_thumbnail_url, TutorialService};
pub use upload::{StoredFile, UploadError, UploadStore};
pub use user::{AdminSeed, UserService, UserServiceError};
