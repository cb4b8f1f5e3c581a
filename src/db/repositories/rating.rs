//! Rating repository
//!
//! Thumbs up/down votes. A user holds at most one vote per item; applying
//! the same vote twice removes it.

use crate::db::{dispatch, DynDatabasePool};
use crate::models::{vote_change, ContentRef, VoteChange};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Rating repository trait
#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Apply the toggle rule for `vote` and return the user's resulting vote
    async fn apply_vote(&self, user_id: i64, target: ContentRef, vote: i32) -> Result<Option<i32>>;

    /// `(likes, dislikes)` for an item
    async fn counts(&self, target: ContentRef) -> Result<(i64, i64)>;

    async fn user_vote(&self, user_id: i64, target: ContentRef) -> Result<Option<i32>>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based rating repository implementation
pub struct SqlxRatingRepository {
    pool: DynDatabasePool,
}

impl SqlxRatingRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn RatingRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl RatingRepository for SqlxRatingRepository {
    async fn apply_vote(&self, user_id: i64, target: ContentRef, vote: i32) -> Result<Option<i32>> {
        let content_type = target.content_type.as_str();
        let now = Utc::now();

        let result = dispatch!(self.pool, db => {
            let mut tx = db.begin().await.context("Failed to begin transaction")?;
            let previous: Option<i32> = sqlx::query_scalar(
                "SELECT vote FROM ratings WHERE user_id = ? AND content_type = ? AND content_id = ?",
            )
            .bind(user_id)
            .bind(content_type)
            .bind(target.content_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to read previous vote")?;

            let result = match vote_change(previous, vote) {
                VoteChange::Insert => {
                    sqlx::query(
                        "INSERT INTO ratings (user_id, content_type, content_id, vote, created_at, updated_at) \
                         VALUES (?, ?, ?, ?, ?, ?)",
                    )
                    .bind(user_id)
                    .bind(content_type)
                    .bind(target.content_id)
                    .bind(vote)
                    .bind(now)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to insert vote")?;
                    Some(vote)
                }
                VoteChange::Remove => {
                    sqlx::query("DELETE FROM ratings WHERE user_id = ? AND content_type = ? AND content_id = ?")
                        .bind(user_id)
                        .bind(content_type)
                        .bind(target.content_id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to remove vote")?;
                    None
                }
                VoteChange::Switch => {
                    sqlx::query(
                        "UPDATE ratings SET vote = ?, updated_at = ? \
                         WHERE user_id = ? AND content_type = ? AND content_id = ?",
                    )
                    .bind(vote)
                    .bind(now)
                    .bind(user_id)
                    .bind(content_type)
                    .bind(target.content_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to switch vote")?;
                    Some(vote)
                }
            };

            tx.commit().await.context("Failed to commit vote")?;
            result
        });

        Ok(result)
    }

    async fn counts(&self, target: ContentRef) -> Result<(i64, i64)> {
        let counts: (i64, i64) = dispatch!(self.pool, db => {
            sqlx::query_as(
                "SELECT COUNT(CASE WHEN vote = 1 THEN 1 END), COUNT(CASE WHEN vote = -1 THEN 1 END) \
                 FROM ratings WHERE content_type = ? AND content_id = ?",
            )
            .bind(target.content_type.as_str())
            .bind(target.content_id)
            .fetch_one(db)
            .await
            .context("Failed to count votes")?
        });
        Ok(counts)
    }

    async fn user_vote(&self, user_id: i64, target: ContentRef) -> Result<Option<i32>> {
        let vote: Option<i32> = dispatch!(self.pool, db => {
            sqlx::query_scalar(
                "SELECT vote FROM ratings WHERE user_id = ? AND content_type = ? AND content_id = ?",
            )
            .bind(user_id)
            .bind(target.content_type.as_str())
            .bind(target.content_id)
            .fetch_optional(db)
            .await
            .context("Failed to read vote")?
        });
        Ok(vote)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = dispatch!(self.pool, db => {
            sqlx::query_scalar("SELECT COUNT(*) FROM ratings")
                .fetch_one(db)
                .await
                .context("Failed to count ratings")?
        });
        Ok(count)
    }
}
