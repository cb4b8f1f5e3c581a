//! Category service
//!
//! Category CRUD with name/slug uniqueness. The category list (with item
//! counts) is cached and invalidated whenever a category or a catalog item
//! changes. Book and tutorial details embed their category, so a category
//! change also drops every cached detail.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CategoryWithCounts, CreateCategoryInput, UpdateCategoryInput};
use crate::services::content::DETAIL_CACHE_PATTERN;
use anyhow::Context;
use std::sync::Arc;

/// Cache key for the category list
pub(crate) const CACHE_KEY_CATEGORY_LIST: &str = "categories:list";

const MAX_NAME_LEN: usize = 100;

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    #[error("Category name already exists: {0}")]
    DuplicateName(String),

    #[error("Category slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Category not found: {0}")]
    NotFound(String),

    /// Books or tutorials still reference the category
    #[error("Category is used by {0} items")]
    InUse(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Category service
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: Arc<Cache>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    /// All categories ordered by name, with book and tutorial counts
    pub async fn list(&self) -> Result<Vec<CategoryWithCounts>, CategoryServiceError> {
        if let Ok(Some(cached)) = self
            .cache
            .get::<Vec<CategoryWithCounts>>(CACHE_KEY_CATEGORY_LIST)
            .await
        {
            return Ok(cached);
        }

        let categories = self
            .repo
            .list_with_counts()
            .await
            .context("Failed to list categories")?;

        if let Err(e) = self.cache.set_default(CACHE_KEY_CATEGORY_LIST, &categories).await {
            tracing::warn!("Failed to cache category list: {}", e);
        }
        Ok(categories)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| CategoryServiceError::NotFound(id.to_string()))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| CategoryServiceError::NotFound(slug.to_string()))
    }

    /// Numeric keys are ids, anything else a slug
    pub async fn get_by_id_or_slug(&self, key: &str) -> Result<Category, CategoryServiceError> {
        match key.parse::<i64>() {
            Ok(id) => self.get_by_id(id).await,
            Err(_) => self.get_by_slug(key).await,
        }
    }

    /// Like [`CategoryService::get_by_id_or_slug`] but `None` for unknown keys
    pub async fn resolve(&self, key: &str) -> Result<Option<Category>, CategoryServiceError> {
        match self.get_by_id_or_slug(key).await {
            Ok(category) => Ok(Some(category)),
            Err(CategoryServiceError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create(&self, input: CreateCategoryInput) -> Result<Category, CategoryServiceError> {
        let name = validate_name(&input.name)?;
        let slug = match input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => generate_slug(slug),
            None => generate_slug(&name),
        };
        if slug.is_empty() {
            return Err(CategoryServiceError::ValidationError(
                "Category slug cannot be empty".into(),
            ));
        }

        if self.repo.get_by_name(&name).await?.is_some() {
            return Err(CategoryServiceError::DuplicateName(name));
        }
        if self.repo.get_by_slug(&slug).await?.is_some() {
            return Err(CategoryServiceError::DuplicateSlug(slug));
        }

        let category = self
            .repo
            .create(&name, &slug, input.description.as_deref(), input.icon.as_deref())
            .await
            .context("Failed to create category")?;

        self.invalidate_cache().await;
        tracing::info!("Created category {} ({})", category.name, category.slug);
        Ok(category)
    }

    pub async fn update(&self, id: i64, input: UpdateCategoryInput) -> Result<Category, CategoryServiceError> {
        let mut category = self.get_by_id(id).await?;

        if let Some(name) = input.name {
            let name = validate_name(&name)?;
            if let Some(other) = self.repo.get_by_name(&name).await? {
                if other.id != id {
                    return Err(CategoryServiceError::DuplicateName(name));
                }
            }
            category.name = name;
        }
        if let Some(slug) = input.slug {
            let slug = generate_slug(&slug);
            if slug.is_empty() {
                return Err(CategoryServiceError::ValidationError(
                    "Category slug cannot be empty".into(),
                ));
            }
            if let Some(other) = self.repo.get_by_slug(&slug).await? {
                if other.id != id {
                    return Err(CategoryServiceError::DuplicateSlug(slug));
                }
            }
            category.slug = slug;
        }
        if input.description.is_some() {
            category.description = input.description.filter(|d| !d.trim().is_empty());
        }
        if input.icon.is_some() {
            category.icon = input.icon.filter(|i| !i.trim().is_empty());
        }

        let category = self.repo.update(&category).await.context("Failed to update category")?;
        self.invalidate_cache().await;
        Ok(category)
    }

    /// Delete an unused category
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        let category = self.get_by_id(id).await?;

        let references = self.repo.count_references(id).await?;
        if references > 0 {
            return Err(CategoryServiceError::InUse(references));
        }

        self.repo.delete(id).await.context("Failed to delete category")?;
        self.invalidate_cache().await;
        tracing::info!("Deleted category {}", category.slug);
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, CategoryServiceError> {
        Ok(self.repo.count().await?)
    }

    async fn invalidate_cache(&self) {
        if let Err(e) = self.cache.delete(CACHE_KEY_CATEGORY_LIST).await {
            tracing::warn!("Failed to invalidate category cache: {}", e);
        }
        if let Err(e) = self.cache.delete_pattern(DETAIL_CACHE_PATTERN).await {
            tracing::warn!("Failed to invalidate content details: {}", e);
        }
    }
}

fn validate_name(name: &str) -> Result<String, CategoryServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategoryServiceError::ValidationError(
            "Category name cannot be empty".into(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CategoryServiceError::ValidationError(format!(
            "Category name cannot exceed {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// Lowercase, keep letters and digits, and join every other run of
/// characters with a single `-`.
///
/// Used for category slugs and tag slugs.
pub fn generate_slug(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
