//! Courses and certificates
//!
//! A course is an ordered list of books and tutorials. Readers earn a
//! certificate once their history marks every item completed.

use crate::db::is_unique_violation;
use crate::db::repositories::{ContentRepository, CourseRepository, HistoryRepository, NewCourse};
use crate::models::{
    Certificate, CertificateView, ContentRef, CourseDetail, CourseItemProgress, CourseProgress,
    CourseSummary, CreateCourseInput, ListParams, PagedResult, User,
};
use crate::services::category::{generate_slug, CategoryService, CategoryServiceError};
use crate::services::content::MAX_TITLE_LEN;
use anyhow::Context;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

const MAX_COURSE_ITEMS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum CourseServiceError {
    #[error("Course not found: {0}")]
    NotFound(String),

    #[error("Course slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("{0} not found")]
    ContentNotFound(ContentRef),

    #[error("Course not finished: {completed} of {total} items completed")]
    NotCompleted { completed: usize, total: usize },

    #[error("Certificate not found: {0}")]
    CertificateNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CourseService {
    repo: Arc<dyn CourseRepository>,
    history: Arc<dyn HistoryRepository>,
    content: Arc<dyn ContentRepository>,
    categories: Arc<CategoryService>,
}

impl CourseService {
    pub fn new(
        repo: Arc<dyn CourseRepository>,
        history: Arc<dyn HistoryRepository>,
        content: Arc<dyn ContentRepository>,
        categories: Arc<CategoryService>,
    ) -> Self {
        Self {
            repo,
            history,
            content,
            categories,
        }
    }

    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<CourseSummary>, CourseServiceError> {
        let (courses, total) = self.repo.list(params).await?;
        Ok(PagedResult::new(courses, total, params))
    }

    /// Course with its items; `viewer` adds per-item completion and overall progress
    pub async fn get(&self, key: &str, viewer: Option<i64>) -> Result<CourseDetail, CourseServiceError> {
        let course = match key.parse::<i64>() {
            Ok(id) => self.repo.get_by_id(id).await?,
            Err(_) => self.repo.get_by_slug(key).await?,
        }
        .ok_or_else(|| CourseServiceError::NotFound(key.to_string()))?;

        let items = self.repo.items(course.id).await?;
        let completed: HashSet<ContentRef> = match viewer {
            Some(user_id) => {
                let targets: Vec<ContentRef> = items.iter().map(|i| i.target()).collect();
                self.history
                    .completed_among(user_id, &targets)
                    .await?
                    .into_iter()
                    .collect()
            }
            None => HashSet::new(),
        };

        let items: Vec<CourseItemProgress> = items
            .into_iter()
            .map(|item| CourseItemProgress {
                completed: completed.contains(&item.target()),
                item,
            })
            .collect();
        let progress = viewer.map(|_| {
            CourseProgress::new(items.iter().filter(|i| i.completed).count(), items.len())
        });

        Ok(CourseDetail {
            course,
            items,
            progress,
        })
    }

    pub async fn create(&self, input: CreateCourseInput, created_by: Option<i64>) -> Result<CourseDetail, CourseServiceError> {
        let title = input.title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(CourseServiceError::ValidationError(format!(
                "Course title must be 1-{} characters",
                MAX_TITLE_LEN
            )));
        }
        let slug = generate_slug(input.slug.as_deref().unwrap_or(title));
        if slug.is_empty() {
            return Err(CourseServiceError::ValidationError("Course slug cannot be empty".into()));
        }
        if self.repo.get_by_slug(&slug).await?.is_some() {
            return Err(CourseServiceError::DuplicateSlug(slug));
        }

        if input.items.is_empty() || input.items.len() > MAX_COURSE_ITEMS {
            return Err(CourseServiceError::ValidationError(format!(
                "A course needs 1-{} items",
                MAX_COURSE_ITEMS
            )));
        }
        let mut seen = HashSet::new();
        for item in &input.items {
            if !seen.insert(*item) {
                return Err(CourseServiceError::ValidationError(format!("{} is listed twice", item)));
            }
            if !self.content.exists(*item).await? {
                return Err(CourseServiceError::ContentNotFound(*item));
            }
        }
        if let Some(category_id) = input.category_id {
            match self.categories.get_by_id(category_id).await {
                Ok(_) => {}
                Err(CategoryServiceError::NotFound(_)) => {
                    return Err(CourseServiceError::ValidationError(format!(
                        "Category not found: {}",
                        category_id
                    )))
                }
                Err(e) => return Err(anyhow::Error::new(e).into()),
            }
        }

        let description = input
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());
        let course = self
            .repo
            .create(
                &NewCourse {
                    title,
                    slug: &slug,
                    description,
                    category_id: input.category_id,
                    created_by,
                },
                &input.items,
            )
            .await
            .context("Failed to create course")?;

        tracing::info!("Created course {} with {} items", course.slug, input.items.len());
        self.get(&course.id.to_string(), None).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), CourseServiceError> {
        if !self.repo.delete(id).await? {
            return Err(CourseServiceError::NotFound(id.to_string()));
        }
        tracing::info!("Deleted course {}", id);
        Ok(())
    }

    /// Issue the caller's certificate for a finished course. Issuing again
    /// returns the certificate already held.
    pub async fn issue_certificate(&self, user: &User, course_id: i64) -> Result<CertificateView, CourseServiceError> {
        let detail = self.get(&course_id.to_string(), Some(user.id)).await?;

        if self.repo.get_certificate(user.id, course_id).await?.is_none() {
            let progress = detail
                .progress
                .unwrap_or_else(|| CourseProgress::new(0, detail.items.len()));
            if !progress.is_finished() {
                return Err(CourseServiceError::NotCompleted {
                    completed: progress.completed,
                    total: progress.total,
                });
            }

            match self
                .repo
                .create_certificate(user.id, course_id, &certificate_code())
                .await
            {
                Ok(certificate) => {
                    tracing::info!("Issued certificate {} to {}", certificate.certificate_code, user.username);
                }
                // A concurrent request issued it first
                Err(e) if is_unique_violation(&e) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let certificate: Certificate = self
            .repo
            .get_certificate(user.id, course_id)
            .await?
            .ok_or_else(|| CourseServiceError::CertificateNotFound(course_id.to_string()))?;
        self.verify(&certificate.certificate_code).await
    }

    pub async fn list_certificates(&self, user_id: i64) -> Result<Vec<CertificateView>, CourseServiceError> {
        Ok(self.repo.list_certificates(user_id).await?)
    }

    /// Public lookup of a certificate by its code
    pub async fn verify(&self, code: &str) -> Result<CertificateView, CourseServiceError> {
        let code = code.trim().to_uppercase();
        self.repo
            .find_certificate(&code)
            .await?
            .ok_or(CourseServiceError::CertificateNotFound(code))
    }
}

/// `IYK-` followed by 12 uppercase hex digits
fn certificate_code() -> String {
    let hex: String = Uuid::new_v4().simple().to_string().chars().take(12).collect();
    format!("IYK-{}", hex.to_uppercase())
}
