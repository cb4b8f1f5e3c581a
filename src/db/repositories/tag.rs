//! Tag repository
//!
//! Tags are shared between books and tutorials through `content_tags`.

use crate::db::{dispatch, DynDatabasePool, InsertedId};
use crate::models::{ContentRef, Tag};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Replace the item's tags with `tags` (`(name, slug)` pairs), creating
    /// tags that do not exist yet
    async fn set_for_content(&self, target: ContentRef, tags: &[(String, String)]) -> Result<Vec<Tag>>;

    /// Tags of one item, ordered by name
    async fn list_for_content(&self, target: ContentRef) -> Result<Vec<Tag>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn set_for_content(&self, target: ContentRef, tags: &[(String, String)]) -> Result<Vec<Tag>> {
        let content_type = target.content_type.as_str();
        dispatch!(self.pool, db => {
            let mut tx = db.begin().await.context("Failed to begin transaction")?;
            sqlx::query("DELETE FROM content_tags WHERE content_type = ? AND content_id = ?")
                .bind(content_type)
                .bind(target.content_id)
                .execute(&mut *tx)
                .await
                .context("Failed to clear content tags")?;

            for (name, slug) in tags {
                let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM tags WHERE slug = ?")
                    .bind(slug)
                    .fetch_optional(&mut *tx)
                    .await
                    .context("Failed to look up tag")?;
                let tag_id = match existing {
                    Some(id) => id,
                    None => sqlx::query("INSERT INTO tags (name, slug) VALUES (?, ?)")
                        .bind(name)
                        .bind(slug)
                        .execute(&mut *tx)
                        .await
                        .with_context(|| format!("Failed to create tag {}", slug))?
                        .inserted_id(),
                };
                let linked: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM content_tags WHERE tag_id = ? AND content_type = ? AND content_id = ?",
                )
                .bind(tag_id)
                .bind(content_type)
                .bind(target.content_id)
                .fetch_one(&mut *tx)
                .await
                .context("Failed to check content tag")?;
                if linked == 0 {
                    sqlx::query("INSERT INTO content_tags (tag_id, content_type, content_id) VALUES (?, ?, ?)")
                        .bind(tag_id)
                        .bind(content_type)
                        .bind(target.content_id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to attach tag")?;
                }
            }

            tx.commit().await.context("Failed to commit tags")?;
        });

        self.list_for_content(target).await
    }

    async fn list_for_content(&self, target: ContentRef) -> Result<Vec<Tag>> {
        let tags = dispatch!(self.pool, db => {
            sqlx::query_as::<_, Tag>(
                "SELECT t.id, t.name, t.slug FROM tags t \
                 JOIN content_tags ct ON ct.tag_id = t.id \
                 WHERE ct.content_type = ? AND ct.content_id = ? \
                 ORDER BY t.name",
            )
            .bind(target.content_type.as_str())
            .bind(target.content_id)
            .fetch_all(db)
            .await
            .context("Failed to list tags")?
        });
        Ok(tags)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let tag = dispatch!(self.pool, db => {
            sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tags WHERE slug = ?")
                .bind(slug)
                .fetch_optional(db)
                .await
                .context("Failed to get tag by slug")?
        });
        Ok(tag)
    }
}
