//! Comment repository
//!
//! Comments attach to a book or tutorial; `parent_id` forms reply threads and
//! deleting a comment removes its replies through the foreign key.

use crate::db::{dispatch, DynDatabasePool, InsertedId};
use crate::models::{Comment, CommentWithAuthor, ContentRef};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, user_id: i64, target: ContentRef, parent_id: Option<i64>, body: &str) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// All comments of an item with author details, oldest first
    async fn list_for_content(&self, target: ContentRef) -> Result<Vec<CommentWithAuthor>>;

    async fn update_body(&self, id: i64, body: &str) -> Result<Comment>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, user_id: i64, target: ContentRef, parent_id: Option<i64>, body: &str) -> Result<Comment> {
        let now = Utc::now();
        let id = dispatch!(self.pool, db => {
            sqlx::query(
                "INSERT INTO comments (user_id, content_type, content_id, parent_id, body, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(target.content_type.as_str())
            .bind(target.content_id)
            .bind(parent_id)
            .bind(body)
            .bind(now)
            .bind(now)
            .execute(db)
            .await
            .context("Failed to create comment")?
            .inserted_id()
        });

        self.get_by_id(id).await?.context("Comment not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let comment = dispatch!(self.pool, db => {
            sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?")
                .bind(id)
                .fetch_optional(db)
                .await
                .context("Failed to get comment")?
        });
        Ok(comment)
    }

    async fn list_for_content(&self, target: ContentRef) -> Result<Vec<CommentWithAuthor>> {
        let comments = dispatch!(self.pool, db => {
            sqlx::query_as::<_, CommentWithAuthor>(
                "SELECT c.*, u.username, u.avatar FROM comments c \
                 JOIN users u ON u.id = c.user_id \
                 WHERE c.content_type = ? AND c.content_id = ? \
                 ORDER BY c.created_at ASC, c.id ASC",
            )
            .bind(target.content_type.as_str())
            .bind(target.content_id)
            .fetch_all(db)
            .await
            .context("Failed to list comments")?
        });
        Ok(comments)
    }

    async fn update_body(&self, id: i64, body: &str) -> Result<Comment> {
        dispatch!(self.pool, db => {
            sqlx::query("UPDATE comments SET body = ?, updated_at = ? WHERE id = ?")
                .bind(body)
                .bind(Utc::now())
                .bind(id)
                .execute(db)
                .await
                .context("Failed to update comment")?;
        });
        self.get_by_id(id).await?.context("Comment not found after update")
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = dispatch!(self.pool, db => {
            sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(db)
                .await
                .context("Failed to delete comment")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = dispatch!(self.pool, db => {
            sqlx::query_scalar("SELECT COUNT(*) FROM comments")
                .fetch_one(db)
                .await
                .context("Failed to count comments")?
        });
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{migrated_pool, seed_book, seed_category, seed_user};
    use crate::models::{build_comment_threads, UserRole};

    #[tokio::test]
    async fn test_thread_and_cascade() {
        let pool = migrated_pool().await;
        let user = seed_user(&pool, "talker", UserRole::User).await;
        let category = seed_category(&pool, "Fiction").await;
        let book = ContentRef::book(seed_book(&pool, category, "Emma").await);
        let repo = SqlxCommentRepository::new(pool);

        let root = repo.create(user, book, None, "Great read").await.unwrap();
        let reply = repo.create(user, book, Some(root.id), "Agreed").await.unwrap();
        repo.create(user, book, Some(reply.id), "Same").await.unwrap();

        let flat = repo.list_for_content(book).await.unwrap();
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[0].username, "talker");
        let threads = build_comment_threads(flat);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].count(), 3);

        let edited = repo.update_body(reply.id, "Edited").await.unwrap();
        assert_eq!(edited.body, "Edited");

        assert!(repo.delete(root.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
