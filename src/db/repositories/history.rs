//! Reading history repository
//!
//! One row per user and item, updated in place as progress moves.

use super::bookmark::{CONTENT_TITLE_COLUMNS, CONTENT_TITLE_JOINS};
use crate::db::{dispatch, DynDatabasePool};
use crate::models::{ContentRef, HistoryEntry, HistoryItem, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// History repository trait
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Insert or update the user's progress on an item. `completed` only
    /// ever moves from false to true.
    async fn upsert(
        &self,
        user_id: i64,
        target: ContentRef,
        progress: i32,
        last_position: Option<&str>,
        completed: bool,
    ) -> Result<HistoryEntry>;

    async fn get(&self, user_id: i64, target: ContentRef) -> Result<Option<HistoryEntry>>;

    /// The user's history, most recently touched first
    async fn list_for_user(&self, user_id: i64, params: &ListParams) -> Result<(Vec<HistoryItem>, i64)>;

    /// Entries of the user for the given items that are completed
    async fn completed_among(&self, user_id: i64, targets: &[ContentRef]) -> Result<Vec<ContentRef>>;

    /// Remove all of the user's history; returns the number of rows removed
    async fn clear(&self, user_id: i64) -> Result<u64>;
}

/// SQLx-based history repository implementation
pub struct SqlxHistoryRepository {
    pool: DynDatabasePool,
}

impl SqlxHistoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn HistoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl HistoryRepository for SqlxHistoryRepository {
    async fn upsert(
        &self,
        user_id: i64,
        target: ContentRef,
        progress: i32,
        last_position: Option<&str>,
        completed: bool,
    ) -> Result<HistoryEntry> {
        let content_type = target.content_type.as_str();
        let now = Utc::now();

        dispatch!(self.pool, db => {
            let mut tx = db.begin().await.context("Failed to begin transaction")?;
            let existing: Option<(i64, bool)> = sqlx::query_as(
                "SELECT id, completed FROM reading_history WHERE user_id = ? AND content_type = ? AND content_id = ?",
            )
            .bind(user_id)
            .bind(content_type)
            .bind(target.content_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to read history entry")?;

            match existing {
                Some((id, was_completed)) => {
                    sqlx::query(
                        "UPDATE reading_history SET progress = ?, last_position = ?, completed = ?, updated_at = ? \
                         WHERE id = ?",
                    )
                    .bind(progress)
                    .bind(last_position)
                    .bind(was_completed || completed)
                    .bind(now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to update history entry")?;
                }
                None => {
                    sqlx::query(
                        "INSERT INTO reading_history (user_id, content_type, content_id, progress, last_position, \
                                                      completed, created_at, updated_at) \
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                    )
                    .bind(user_id)
                    .bind(content_type)
                    .bind(target.content_id)
                    .bind(progress)
                    .bind(last_position)
                    .bind(completed)
                    .bind(now)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to insert history entry")?;
                }
            }
            tx.commit().await.context("Failed to commit history entry")?;
        });

        self.get(user_id, target)
            .await?
            .context("History entry not found after upsert")
    }

    async fn get(&self, user_id: i64, target: ContentRef) -> Result<Option<HistoryEntry>> {
        let entry = dispatch!(self.pool, db => {
            sqlx::query_as::<_, HistoryEntry>(
                "SELECT * FROM reading_history WHERE user_id = ? AND content_type = ? AND content_id = ?",
            )
            .bind(user_id)
            .bind(target.content_type.as_str())
            .bind(target.content_id)
            .fetch_optional(db)
            .await
            .context("Failed to get history entry")?
        });
        Ok(entry)
    }

    async fn list_for_user(&self, user_id: i64, params: &ListParams) -> Result<(Vec<HistoryItem>, i64)> {
        let list_sql = format!(
            "SELECT x.*, {} FROM reading_history x {} WHERE x.user_id = ? \
             ORDER BY x.updated_at DESC, x.id DESC LIMIT ? OFFSET ?",
            CONTENT_TITLE_COLUMNS, CONTENT_TITLE_JOINS
        );
        let (items, total): (Vec<HistoryItem>, i64) = dispatch!(self.pool, db => {
            let total = sqlx::query_scalar("SELECT COUNT(*) FROM reading_history WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(db)
                .await
                .context("Failed to count history")?;
            let items = sqlx::query_as::<_, HistoryItem>(&list_sql)
                .bind(user_id)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(db)
                .await
                .context("Failed to list history")?;
            (items, total)
        });
        Ok((items, total))
    }

    async fn completed_among(&self, user_id: i64, targets: &[ContentRef]) -> Result<Vec<ContentRef>> {
        let rows: Vec<HistoryEntry> = dispatch!(self.pool, db => {
            sqlx::query_as::<_, HistoryEntry>(
                "SELECT * FROM reading_history WHERE user_id = ? AND completed = ?",
            )
            .bind(user_id)
            .bind(true)
            .fetch_all(db)
            .await
            .context("Failed to list completed history")?
        });
        Ok(rows
            .into_iter()
            .map(|entry| ContentRef::new(entry.content_type, entry.content_id))
            .filter(|done| targets.contains(done))
            .collect())
    }

    async fn clear(&self, user_id: i64) -> Result<u64> {
        let affected = dispatch!(self.pool, db => {
            sqlx::query("DELETE FROM reading_history WHERE user_id = ?")
                .bind(user_id)
                .execute(db)
                .await
                .context("Failed to clear history")?
                .rows_affected()
        });
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{migrated_pool, seed_book, seed_category, seed_tutorial, seed_user};
    use crate::models::UserRole;

    #[tokio::test]
    async fn test_upsert_keeps_one_row() {
        let pool = migrated_pool().await;
        let user = seed_user(&pool, "reader", UserRole::User).await;
        let category = seed_category(&pool, "Science").await;
        let book = ContentRef::book(seed_book(&pool, category, "Cosmos").await);
        let repo = SqlxHistoryRepository::new(pool);

        let first = repo.upsert(user, book, 40, Some("page 120"), false).await.unwrap();
        let second = repo.upsert(user, book, 100, Some("page 300"), true).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.completed);

        let reopened = repo.upsert(user, book, 10, None, false).await.unwrap();
        assert_eq!(reopened.progress, 10);
        assert!(reopened.completed);

        let (items, total) = repo.list_for_user(user, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].title.as_deref(), Some("Cosmos"));
    }

    #[tokio::test]
    async fn test_completed_among_and_clear() {
        let pool = migrated_pool().await;
        let user = seed_user(&pool, "student", UserRole::User).await;
        let category = seed_category(&pool, "Science").await;
        let book = ContentRef::book(seed_book(&pool, category, "Cosmos").await);
        let tutorial = ContentRef::tutorial(seed_tutorial(&pool, category, "Orbits").await);
        let repo = SqlxHistoryRepository::new(pool);

        repo.upsert(user, book, 100, None, true).await.unwrap();
        repo.upsert(user, tutorial, 50, None, false).await.unwrap();

        let done = repo.completed_among(user, &[book, tutorial]).await.unwrap();
        assert_eq!(done, vec![book]);

        assert_eq!(repo.clear(user).await.unwrap(), 2);
        assert!(repo.get(user, book).await.unwrap().is_none());
    }
}
