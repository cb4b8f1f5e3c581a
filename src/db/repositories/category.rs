//! Category repository
//!
//! Database operations for categories, including the per-category
//! book and tutorial counts shown on the category grid.

use crate::db::{dispatch, DynDatabasePool, InsertedId};
use crate::models::{Category, CategoryWithCounts};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Insert a category
    async fn create(
        &self,
        name: &str,
        slug: &str,
        description: Option<&str>,
        icon: Option<&str>,
    ) -> Result<Category>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// Case-insensitive lookup by display name
    async fn get_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// All categories ordered by name, with item counts
    async fn list_with_counts(&self) -> Result<Vec<CategoryWithCounts>>;

    /// Persist name, slug, description and icon
    async fn update(&self, category: &Category) -> Result<Category>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Number of books and tutorials filed under the category
    async fn count_references(&self, id: i64) -> Result<i64>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    /// Create a new SQLx category repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(
        &self,
        name: &str,
        slug: &str,
        description: Option<&str>,
        icon: Option<&str>,
    ) -> Result<Category> {
        let now = Utc::now();
        let id = dispatch!(self.pool, db => {
            sqlx::query(
                "INSERT INTO categories (name, slug, description, icon, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(name)
            .bind(slug)
            .bind(description)
            .bind(icon)
            .bind(now)
            .bind(now)
            .execute(db)
            .await
            .context("Failed to create category")?
            .inserted_id()
        });

        self.get_by_id(id)
            .await?
            .context("Category not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let category = dispatch!(self.pool, db => {
            sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
                .bind(id)
                .fetch_optional(db)
                .await
                .context("Failed to get category by id")?
        });
        Ok(category)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let category = dispatch!(self.pool, db => {
            sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE slug = ?")
                .bind(slug)
                .fetch_optional(db)
                .await
                .context("Failed to get category by slug")?
        });
        Ok(category)
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        let category = dispatch!(self.pool, db => {
            sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE LOWER(name) = ?")
                .bind(name.to_lowercase())
                .fetch_optional(db)
                .await
                .context("Failed to get category by name")?
        });
        Ok(category)
    }

    async fn list_with_counts(&self) -> Result<Vec<CategoryWithCounts>> {
        let categories = dispatch!(self.pool, db => {
            sqlx::query_as::<_, CategoryWithCounts>(
                "SELECT c.*, \
                        (SELECT COUNT(*) FROM books b WHERE b.category_id = c.id) AS book_count, \
                        (SELECT COUNT(*) FROM tutorials t WHERE t.category_id = c.id) AS tutorial_count \
                 FROM categories c ORDER BY c.name",
            )
            .fetch_all(db)
            .await
            .context("Failed to list categories")?
        });
        Ok(categories)
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        dispatch!(self.pool, db => {
            sqlx::query(
                "UPDATE categories SET name = ?, slug = ?, description = ?, icon = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(&category.icon)
            .bind(Utc::now())
            .bind(category.id)
            .execute(db)
            .await
            .context("Failed to update category")?;
        });

        self.get_by_id(category.id)
            .await?
            .context("Category not found after update")
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = dispatch!(self.pool, db => {
            sqlx::query("DELETE FROM categories WHERE id = ?")
                .bind(id)
                .execute(db)
                .await
                .context("Failed to delete category")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn count_references(&self, id: i64) -> Result<i64> {
        let (books, tutorials): (i64, i64) = dispatch!(self.pool, db => {
            sqlx::query_as(
                "SELECT (SELECT COUNT(*) FROM books WHERE category_id = ?), \
                        (SELECT COUNT(*) FROM tutorials WHERE category_id = ?)",
            )
            .bind(id)
            .bind(id)
            .fetch_one(db)
            .await
            .context("Failed to count category references")?
        });
        Ok(books + tutorials)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = dispatch!(self.pool, db => {
            sqlx::query_scalar("SELECT COUNT(*) FROM categories")
                .fetch_one(db)
                .await
                .context("Failed to count categories")?
        });
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{migrated_pool, seed_book, seed_tutorial};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxCategoryRepository) {
        let pool = migrated_pool().await;
        let repo = SqlxCategoryRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo
            .create("Programming", "programming", Some("Code books"), Some("code"))
            .await
            .expect("Failed to create category");

        assert_eq!(created.slug, "programming");
        assert_eq!(created.icon.as_deref(), Some("code"));
        assert!(repo.get_by_slug("programming").await.unwrap().is_some());
        assert!(repo.get_by_name("PROGRAMMING").await.unwrap().is_some());
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_slug_fails() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create("History", "history", None, None).await.unwrap();

        assert!(repo.create("History 2", "history", None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_list_with_counts() {
        let (pool, repo) = setup_test_repo().await;
        let science = repo.create("Science", "science", None, None).await.unwrap();
        repo.create("Art", "art", None, None).await.unwrap();
        seed_book(&pool, science.id, "Cosmos").await;
        seed_book(&pool, science.id, "Brief History of Time").await;
        seed_tutorial(&pool, science.id, "Physics 101").await;

        let list = repo.list_with_counts().await.unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].category.name, "Art");
        assert_eq!(list[0].book_count, 0);
        assert_eq!(list[1].book_count, 2);
        assert_eq!(list[1].tutorial_count, 1);
        assert_eq!(repo.count_references(science.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_pool, repo) = setup_test_repo().await;
        let mut category = repo.create("Poetry", "poetry", None, None).await.unwrap();

        category.name = "Poems".into();
        category.description = Some("Verse".into());
        let updated = repo.update(&category).await.unwrap();
        assert_eq!(updated.name, "Poems");
        assert_eq!(updated.description.as_deref(), Some("Verse"));

        assert!(repo.delete(category.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
