//! Catalog content: books, video tutorials and their tags
//!
//! Engagement tables point at either kind of item through a
//! `(content_type, content_id)` pair, modelled here as [`ContentRef`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Category, InvalidValue, RatingSummary};

/// Discriminator for polymorphic content references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Book,
    Tutorial,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Book => "book",
            ContentType::Tutorial => "tutorial",
        }
    }

    /// Table holding items of this type
    pub fn table(&self) -> &'static str {
        match self {
            ContentType::Book => "books",
            ContentType::Tutorial => "tutorials",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = InvalidValue;

    /// Accepts singular and plural forms (`book`, `books`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "book" | "books" => Ok(ContentType::Book),
            "tutorial" | "tutorials" => Ok(ContentType::Tutorial),
            _ => Err(InvalidValue::new("content type", s)),
        }
    }
}

impl TryFrom<String> for ContentType {
    type Error = InvalidValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Pointer to a single book or tutorial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub content_type: ContentType,
    pub content_id: i64,
}

impl ContentRef {
    pub fn new(content_type: ContentType, content_id: i64) -> Self {
        Self {
            content_type,
            content_id,
        }
    }

    pub fn book(id: i64) -> Self {
        Self::new(ContentType::Book, id)
    }

    pub fn tutorial(id: i64) -> Self {
        Self::new(ContentType::Tutorial, id)
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.content_type, self.content_id)
    }
}

/// Book entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub category_id: i64,
    /// Stored image URL (uploads or external)
    pub cover_image: Option<String>,
    /// Downloadable file (PDF/EPUB)
    pub file_url: Option<String>,
    /// File size in bytes
    pub file_size: Option<i64>,
    pub pages: Option<i32>,
    pub language: Option<String>,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    pub published_year: Option<i32>,
    pub download_count: i64,
    pub view_count: i64,
    pub is_featured: bool,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Difficulty level of a tutorial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TutorialLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl TutorialLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TutorialLevel::Beginner => "beginner",
            TutorialLevel::Intermediate => "intermediate",
            TutorialLevel::Advanced => "advanced",
        }
    }
}

impl FromStr for TutorialLevel {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" => Ok(TutorialLevel::Beginner),
            "intermediate" => Ok(TutorialLevel::Intermediate),
            "advanced" => Ok(TutorialLevel::Advanced),
            _ => Err(InvalidValue::new("tutorial level", s)),
        }
    }
}

impl TryFrom<String> for TutorialLevel {
    type Error = InvalidValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Video tutorial entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Tutorial {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub video_url: String,
    /// 11-character YouTube video id derived from `video_url`
    pub youtube_id: String,
    pub thumbnail: Option<String>,
    pub duration_seconds: Option<i32>,
    pub instructor: Option<String>,
    #[sqlx(try_from = "String")]
    pub level: TutorialLevel,
    pub view_count: i64,
    pub is_featured: bool,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tag attached to books and tutorials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Row of a book listing: the book plus category and vote counters
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BookListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub book: Book,
    pub category_name: String,
    pub category_slug: String,
    pub likes: i64,
    pub dislikes: i64,
}

/// Row of a tutorial listing
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TutorialListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub tutorial: Tutorial,
    pub category_name: String,
    pub category_slug: String,
    pub likes: i64,
    pub dislikes: i64,
}

/// Full book page payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookDetail {
    #[serde(flatten)]
    pub book: Book,
    pub category: Category,
    pub tags: Vec<Tag>,
    pub rating: RatingSummary,
}

/// Full tutorial page payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorialDetail {
    #[serde(flatten)]
    pub tutorial: Tutorial,
    pub category: Category,
    pub tags: Vec<Tag>,
    pub rating: RatingSummary,
}

/// Input for creating a book
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateBookInput {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub category_id: i64,
    /// URL or `data:` URL; the latter is stored through the upload store
    pub cover_image: Option<String>,
    pub file_url: Option<String>,
    pub file_size: Option<i64>,
    pub pages: Option<i32>,
    pub language: Option<String>,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    pub published_year: Option<i32>,
    pub is_featured: bool,
    pub tags: Vec<String>,
}

/// Input for updating a book; `None` keeps the current value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateBookInput {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub cover_image: Option<String>,
    pub file_url: Option<String>,
    pub file_size: Option<i64>,
    pub pages: Option<i32>,
    pub language: Option<String>,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    pub published_year: Option<i32>,
    pub is_featured: Option<bool>,
    pub tags: Option<Vec<String>>,
}

/// Input for creating a tutorial
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateTutorialInput {
    pub title: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub video_url: String,
    pub thumbnail: Option<String>,
    pub duration_seconds: Option<i32>,
    pub instructor: Option<String>,
    pub level: TutorialLevel,
    pub is_featured: bool,
    pub tags: Vec<String>,
}

/// Input for updating a tutorial; `None` keeps the current value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateTutorialInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub video_url: Option<String>,
    pub thumbnail: Option<String>,
    pub duration_seconds: Option<i32>,
    pub instructor: Option<String>,
    pub level: Option<TutorialLevel>,
    pub is_featured: Option<bool>,
    pub tags: Option<Vec<String>>,
}

/// Listing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentSort {
    #[default]
    Newest,
    Oldest,
    Title,
    /// Downloads for books, views for tutorials
    Popular,
    /// Likes minus dislikes
    Rating,
}

/// Filters for book and tutorial listings, read from the query string
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContentQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    /// Category id or slug
    pub category: Option<String>,
    /// Tag slug
    pub tag: Option<String>,
    pub featured: Option<bool>,
    /// Tutorials only
    pub level: Option<TutorialLevel>,
    pub sort: ContentSort,
}

impl ContentQuery {
    /// Non-empty, trimmed search term
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
