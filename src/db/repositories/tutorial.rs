//! Tutorial repository

use super::content::{listing_sql, ContentFilter, CONTENT_CLEANUP_SQL};
use crate::db::{bind_args, dispatch, DynDatabasePool, InsertedId, SqlArg};
use crate::models::{ContentType, ListParams, Tutorial, TutorialLevel, TutorialListItem};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Columns of a new tutorial row after URL parsing and image storage
#[derive(Debug, Clone, Default)]
pub struct NewTutorial {
    pub title: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub video_url: String,
    pub youtube_id: String,
    pub thumbnail: Option<String>,
    pub duration_seconds: Option<i32>,
    pub instructor: Option<String>,
    pub level: TutorialLevel,
    pub is_featured: bool,
    pub created_by: Option<i64>,
}

/// Tutorial repository trait
#[async_trait]
pub trait TutorialRepository: Send + Sync {
    async fn create(&self, tutorial: &NewTutorial) -> Result<Tutorial>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Tutorial>>;

    /// Filtered, sorted page of tutorials with category and vote counters
    async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<(Vec<TutorialListItem>, i64)>;

    async fn update(&self, tutorial: &Tutorial) -> Result<Tutorial>;

    /// Delete the tutorial together with its polymorphic rows
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn increment_view_count(&self, id: i64) -> Result<()>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based tutorial repository implementation
pub struct SqlxTutorialRepository {
    pool: DynDatabasePool,
}

impl SqlxTutorialRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TutorialRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TutorialRepository for SqlxTutorialRepository {
    async fn create(&self, tutorial: &NewTutorial) -> Result<Tutorial> {
        let now = Utc::now();
        let id = dispatch!(self.pool, db => {
            sqlx::query(
                "INSERT INTO tutorials (title, description, category_id, video_url, youtube_id, thumbnail, \
                                        duration_seconds, instructor, level, is_featured, created_by, \
                                        created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&tutorial.title)
            .bind(&tutorial.description)
            .bind(tutorial.category_id)
            .bind(&tutorial.video_url)
            .bind(&tutorial.youtube_id)
            .bind(&tutorial.thumbnail)
            .bind(tutorial.duration_seconds)
            .bind(&tutorial.instructor)
            .bind(tutorial.level.as_str())
            .bind(tutorial.is_featured)
            .bind(tutorial.created_by)
            .bind(now)
            .bind(now)
            .execute(db)
            .await
            .context("Failed to create tutorial")?
            .inserted_id()
        });

        self.get_by_id(id).await?.context("Tutorial not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tutorial>> {
        let tutorial = dispatch!(self.pool, db => {
            sqlx::query_as::<_, Tutorial>("SELECT * FROM tutorials WHERE id = ?")
                .bind(id)
                .fetch_optional(db)
                .await
                .context("Failed to get tutorial")?
        });
        Ok(tutorial)
    }

    async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<(Vec<TutorialListItem>, i64)> {
        let sql = listing_sql(ContentType::Tutorial, filter);
        let count_sql = format!("SELECT COUNT(*) {}", sql.from_where);
        let list_sql = format!("{} {} {} LIMIT ? OFFSET ?", sql.select, sql.from_where, sql.order_by);
        let mut page_args = sql.args.clone();
        page_args.push(SqlArg::Int(params.limit()));
        page_args.push(SqlArg::Int(params.offset()));

        let (items, total): (Vec<TutorialListItem>, i64) = dispatch!(self.pool, db => {
            let total = bind_args!(sqlx::query_scalar(&count_sql), sql.args)
                .fetch_one(db)
                .await
                .context("Failed to count tutorials")?;
            let items = bind_args!(sqlx::query_as::<_, TutorialListItem>(&list_sql), page_args)
                .fetch_all(db)
                .await
                .context("Failed to list tutorials")?;
            (items, total)
        });

        Ok((items, total))
    }

    async fn update(&self, tutorial: &Tutorial) -> Result<Tutorial> {
        dispatch!(self.pool, db => {
            sqlx::query(
                "UPDATE tutorials SET title = ?, description = ?, category_id = ?, video_url = ?, youtube_id = ?, \
                                      thumbnail = ?, duration_seconds = ?, instructor = ?, level = ?, \
                                      is_featured = ?, updated_at = ? \
                 WHERE id = ?",
            )
            .bind(&tutorial.title)
            .bind(&tutorial.description)
            .bind(tutorial.category_id)
            .bind(&tutorial.video_url)
            .bind(&tutorial.youtube_id)
            .bind(&tutorial.thumbnail)
            .bind(tutorial.duration_seconds)
            .bind(&tutorial.instructor)
            .bind(tutorial.level.as_str())
            .bind(tutorial.is_featured)
            .bind(Utc::now())
            .bind(tutorial.id)
            .execute(db)
            .await
            .context("Failed to update tutorial")?;
        });

        self.get_by_id(tutorial.id).await?.context("Tutorial not found after update")
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let content_type = ContentType::Tutorial.as_str();
        let affected = dispatch!(self.pool, db => {
            let mut tx = db.begin().await.context("Failed to begin transaction")?;
            for statement in CONTENT_CLEANUP_SQL {
                sqlx::query(statement)
                    .bind(content_type)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("Failed to clean up tutorial {}", id))?;
            }
            let affected = sqlx::query("DELETE FROM tutorials WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete tutorial")?
                .rows_affected();
            tx.commit().await.context("Failed to commit tutorial deletion")?;
            affected
        });
        Ok(affected > 0)
    }

    async fn increment_view_count(&self, id: i64) -> Result<()> {
        dispatch!(self.pool, db => {
            sqlx::query("UPDATE tutorials SET view_count = view_count + 1 WHERE id = ?")
                .bind(id)
                .execute(db)
                .await
                .context("Failed to increment tutorial view count")?;
        });
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = dispatch!(self.pool, db => {
            sqlx::query_scalar("SELECT COUNT(*) FROM tutorials")
                .fetch_one(db)
                .await
                .context("Failed to count tutorials")?
        });
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{migrated_pool, seed_category};

    fn new_tutorial(title: &str, category_id: i64, level: TutorialLevel) -> NewTutorial {
        NewTutorial {
            title: title.to_string(),
            category_id,
            video_url: "https://www.youtube.com/watch?v=abcdefghijk".into(),
            youtube_id: "abcdefghijk".into(),
            level,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_update_and_level_filter() {
        let pool = migrated_pool().await;
        let category = seed_category(&pool, "Design").await;
        let repo = SqlxTutorialRepository::new(pool);

        let mut basics = repo
            .create(&new_tutorial("Figma Basics", category, TutorialLevel::Beginner))
            .await
            .unwrap();
        repo.create(&new_tutorial("Design Systems", category, TutorialLevel::Advanced))
            .await
            .unwrap();
        assert_eq!(basics.youtube_id, "abcdefghijk");
        assert_eq!(basics.level, TutorialLevel::Beginner);

        basics.instructor = Some("Ada".into());
        basics.level = TutorialLevel::Intermediate;
        let updated = repo.update(&basics).await.unwrap();
        assert_eq!(updated.instructor.as_deref(), Some("Ada"));

        let filter = ContentFilter {
            level: Some(TutorialLevel::Intermediate),
            ..Default::default()
        };
        let (items, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].tutorial.title, "Figma Basics");
        assert_eq!(items[0].category_slug, "design");

        let filter = ContentFilter {
            search: Some("ada".into()),
            ..Default::default()
        };
        assert_eq!(repo.list(&filter, &ListParams::default()).await.unwrap().1, 1);
    }

    #[tokio::test]
    async fn test_views_and_delete() {
        let pool = migrated_pool().await;
        let category = seed_category(&pool, "Music").await;
        let repo = SqlxTutorialRepository::new(pool);
        let tutorial = repo
            .create(&new_tutorial("Scales", category, TutorialLevel::Beginner))
            .await
            .unwrap();

        repo.increment_view_count(tutorial.id).await.unwrap();
        assert_eq!(repo.get_by_id(tutorial.id).await.unwrap().unwrap().view_count, 1);

        assert!(repo.delete(tutorial.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
