//! Bookmark repository

use crate::db::{dispatch, DynDatabasePool};
use crate::models::{BookmarkItem, ContentRef, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Title and image of the bookmarked or visited item, for either content type.
/// Expects the polymorphic table aliased as `x`.
pub(crate) const CONTENT_TITLE_COLUMNS: &str = "\
    COALESCE(b.title, t.title) AS title, \
    COALESCE(b.cover_image, t.thumbnail) AS image";

pub(crate) const CONTENT_TITLE_JOINS: &str = "\
    LEFT JOIN books b ON x.content_type = 'book' AND b.id = x.content_id \
    LEFT JOIN tutorials t ON x.content_type = 'tutorial' AND t.id = x.content_id";

/// Bookmark repository trait
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// Add a bookmark; returns false when it already existed
    async fn add(&self, user_id: i64, target: ContentRef) -> Result<bool>;

    /// Remove a bookmark; returns false when there was none
    async fn remove(&self, user_id: i64, target: ContentRef) -> Result<bool>;

    async fn exists(&self, user_id: i64, target: ContentRef) -> Result<bool>;

    /// The user's bookmarks, newest first
    async fn list_for_user(&self, user_id: i64, params: &ListParams) -> Result<(Vec<BookmarkItem>, i64)>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based bookmark repository implementation
pub struct SqlxBookmarkRepository {
    pool: DynDatabasePool,
}

impl SqlxBookmarkRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BookmarkRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl BookmarkRepository for SqlxBookmarkRepository {
    async fn add(&self, user_id: i64, target: ContentRef) -> Result<bool> {
        let content_type = target.content_type.as_str();
        let inserted = dispatch!(self.pool, db => {
            let mut tx = db.begin().await.context("Failed to begin transaction")?;
            let existing: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM bookmarks WHERE user_id = ? AND content_type = ? AND content_id = ?",
            )
            .bind(user_id)
            .bind(content_type)
            .bind(target.content_id)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to check bookmark")?;
            if existing == 0 {
                sqlx::query(
                    "INSERT INTO bookmarks (user_id, content_type, content_id, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(user_id)
                .bind(content_type)
                .bind(target.content_id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await
                .context("Failed to add bookmark")?;
            }
            tx.commit().await.context("Failed to commit bookmark")?;
            existing == 0
        });
        Ok(inserted)
    }

    async fn remove(&self, user_id: i64, target: ContentRef) -> Result<bool> {
        let affected = dispatch!(self.pool, db => {
            sqlx::query("DELETE FROM bookmarks WHERE user_id = ? AND content_type = ? AND content_id = ?")
                .bind(user_id)
                .bind(target.content_type.as_str())
                .bind(target.content_id)
                .execute(db)
                .await
                .context("Failed to remove bookmark")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn exists(&self, user_id: i64, target: ContentRef) -> Result<bool> {
        let count: i64 = dispatch!(self.pool, db => {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM bookmarks WHERE user_id = ? AND content_type = ? AND content_id = ?",
            )
            .bind(user_id)
            .bind(target.content_type.as_str())
            .bind(target.content_id)
            .fetch_one(db)
            .await
            .context("Failed to check bookmark")?
        });
        Ok(count > 0)
    }

    async fn list_for_user(&self, user_id: i64, params: &ListParams) -> Result<(Vec<BookmarkItem>, i64)> {
        let list_sql = format!(
            "SELECT x.*, {} FROM bookmarks x {} WHERE x.user_id = ? \
             ORDER BY x.created_at DESC, x.id DESC LIMIT ? OFFSET ?",
            CONTENT_TITLE_COLUMNS, CONTENT_TITLE_JOINS
        );
        let (items, total): (Vec<BookmarkItem>, i64) = dispatch!(self.pool, db => {
            let total = sqlx::query_scalar("SELECT COUNT(*) FROM bookmarks WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(db)
                .await
                .context("Failed to count bookmarks")?;
            let items = sqlx::query_as::<_, BookmarkItem>(&list_sql)
                .bind(user_id)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(db)
                .await
                .context("Failed to list bookmarks")?;
            (items, total)
        });
        Ok((items, total))
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = dispatch!(self.pool, db => {
            sqlx::query_scalar("SELECT COUNT(*) FROM bookmarks")
                .fetch_one(db)
                .await
                .context("Failed to count bookmarks")?
        });
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{migrated_pool, seed_book, seed_category, seed_tutorial, seed_user};
    use crate::models::UserRole;

    #[tokio::test]
    async fn test_add_remove_and_list() {
        let pool = migrated_pool().await;
        let user = seed_user(&pool, "reader", UserRole::User).await;
        let category = seed_category(&pool, "Science").await;
        let book = ContentRef::book(seed_book(&pool, category, "Cosmos").await);
        let tutorial = ContentRef::tutorial(seed_tutorial(&pool, category, "Orbits").await);
        let repo = SqlxBookmarkRepository::new(pool);

        assert!(repo.add(user, book).await.unwrap());
        assert!(!repo.add(user, book).await.unwrap());
        assert!(repo.add(user, tutorial).await.unwrap());
        assert!(repo.exists(user, book).await.unwrap());

        let (items, total) = repo.list_for_user(user, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        let mut titles: Vec<_> = items.iter().filter_map(|i| i.title.clone()).collect();
        titles.sort();
        assert_eq!(titles, vec!["Cosmos", "Orbits"]);

        assert!(repo.remove(user, book).await.unwrap());
        assert!(!repo.remove(user, book).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
