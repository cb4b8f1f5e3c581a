//! Helpers shared by the book and tutorial services

use crate::models::{ContentQuery, ContentRef};
use crate::services::category::{generate_slug, CategoryService, CategoryServiceError};
use crate::services::upload::{is_data_url, UploadError, UploadStore};
use std::collections::HashSet;

const MAX_TAGS: usize = 20;
const MAX_TAG_LEN: usize = 50;
pub(crate) const MAX_TITLE_LEN: usize = 255;

/// Error types for book and tutorial operations
#[derive(Debug, thiserror::Error)]
pub enum ContentServiceError {
    #[error("{0} not found")]
    NotFound(ContentRef),

    #[error("Category not found: {0}")]
    CategoryNotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<CategoryServiceError> for ContentServiceError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::InternalError(e) => ContentServiceError::InternalError(e),
            other => ContentServiceError::ValidationError(other.to_string()),
        }
    }
}

/// Cache key for the detail view of one item
/// Matches every cached book and tutorial detail
pub(crate) const DETAIL_CACHE_PATTERN: &str = "content:*";

pub(crate) fn detail_cache_key(target: ContentRef) -> String {
    format!("content:{}", target)
}

/// Resolve the `category` query value (id or slug).
///
/// `Ok(None)` means the category does not exist and the listing is empty;
/// `Ok(Some(None))` means no category filter.
pub(crate) async fn resolve_category_filter(
    categories: &CategoryService,
    query: &ContentQuery,
) -> Result<Option<Option<i64>>, ContentServiceError> {
    match query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(Some(None)),
        Some(key) => Ok(categories.resolve(key).await?.map(|c| Some(c.id))),
    }
}

pub(crate) async fn ensure_category(categories: &CategoryService, id: i64) -> Result<(), ContentServiceError> {
    match categories.get_by_id(id).await {
        Ok(_) => Ok(()),
        Err(CategoryServiceError::NotFound(_)) => Err(ContentServiceError::CategoryNotFound(id)),
        Err(e) => Err(e.into()),
    }
}

/// Persist a `data:` URL through the upload store and return the stored URL.
/// Other values pass through; blank values become `None`.
pub(crate) async fn store_image(
    uploads: &UploadStore,
    value: Option<String>,
) -> Result<Option<String>, ContentServiceError> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) if is_data_url(&v) => Ok(Some(uploads.save_data_url(&v).await?.url)),
        other => Ok(other),
    }
}

pub(crate) fn require_text(field: &str, value: &str, max: usize) -> Result<String, ContentServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ContentServiceError::ValidationError(format!("{} is required", field)));
    }
    if value.chars().count() > max {
        return Err(ContentServiceError::ValidationError(format!(
            "{} cannot exceed {} characters",
            field, max
        )));
    }
    Ok(value.to_string())
}

pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Trim, drop blanks and duplicates (by slug), and pair each tag with its slug
pub(crate) fn normalize_tags(tags: &[String]) -> Result<Vec<(String, String)>, ContentServiceError> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::new();
    for tag in tags {
        let name = tag.trim();
        let slug = generate_slug(name);
        if slug.is_empty() || !seen.insert(slug.clone()) {
            continue;
        }
        if name.chars().count() > MAX_TAG_LEN {
            return Err(ContentServiceError::ValidationError(format!(
                "Tag '{}' is longer than {} characters",
                name, MAX_TAG_LEN
            )));
        }
        normalized.push((name.to_string(), slug));
    }
    if normalized.len() > MAX_TAGS {
        return Err(ContentServiceError::ValidationError(format!(
            "At most {} tags are allowed",
            MAX_TAGS
        )));
    }
    Ok(normalized)
}
