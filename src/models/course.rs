//! Courses (ordered reading/watching lists) and completion certificates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentRef, ContentType};

/// Course entity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Course listing row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CourseSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub course: Course,
    pub item_count: i64,
}

/// Item of a course, joined with the title of the content it points at
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CourseItem {
    pub id: i64,
    pub course_id: i64,
    #[sqlx(try_from = "String")]
    pub content_type: ContentType,
    pub content_id: i64,
    pub position: i32,
    pub title: Option<String>,
}

impl CourseItem {
    pub fn target(&self) -> ContentRef {
        ContentRef::new(self.content_type, self.content_id)
    }
}

/// Course item with the caller's completion state
#[derive(Debug, Clone, Serialize)]
pub struct CourseItemProgress {
    #[serde(flatten)]
    pub item: CourseItem,
    pub completed: bool,
}

/// Caller's progress through a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CourseProgress {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}

impl CourseProgress {
    pub fn new(completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            0
        } else {
            ((completed * 100) / total).min(100) as u8
        };
        Self {
            completed,
            total,
            percent,
        }
    }

    /// A course with no items can never be finished
    pub fn is_finished(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }
}

/// Payload of `GET /api/courses/{id}`
#[derive(Debug, Clone, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub items: Vec<CourseItemProgress>,
    /// Present when the caller is signed in
    pub progress: Option<CourseProgress>,
}

/// Input for creating a course
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCourseInput {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    /// Items in course order
    #[serde(default)]
    pub items: Vec<ContentRef>,
}

/// Issued certificate
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Certificate {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub certificate_code: String,
    pub issued_at: DateTime<Utc>,
}

/// Certificate with the names a verifier needs to see
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CertificateView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub certificate: Certificate,
    pub course_title: String,
    pub username: String,
    pub full_name: Option<String>,
}
