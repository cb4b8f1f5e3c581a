//! Analytics repository
//!
//! Append-only event logs (downloads, views, searches, admin activity) and
//! the aggregate queries behind the admin dashboard.

use crate::db::{dispatch, DynDatabasePool};
use crate::models::{ActivityLog, ContentRef, DailyCount, ListParams, SearchTerm, TopContent, Totals};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Client details attached to download and view events
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub user_id: Option<i64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Log tables that can be bucketed per day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLog {
    Downloads,
    Views,
}

impl EventLog {
    fn table(&self) -> &'static str {
        match self {
            EventLog::Downloads => "download_logs",
            EventLog::Views => "view_logs",
        }
    }
}

/// Analytics repository trait
#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn log_download(&self, book_id: i64, client: &ClientInfo) -> Result<()>;

    async fn log_view(&self, target: ContentRef, client: &ClientInfo) -> Result<()>;

    async fn log_search(&self, user_id: Option<i64>, query: &str, results_count: i64) -> Result<()>;

    async fn log_activity(
        &self,
        user_id: Option<i64>,
        action: &str,
        entity_type: Option<&str>,
        entity_id: Option<i64>,
        details: Option<&str>,
    ) -> Result<()>;

    async fn totals(&self) -> Result<Totals>;

    /// Per-day event counts since `since`, only for days with events
    async fn daily_counts(&self, log: EventLog, since: DateTime<Utc>) -> Result<Vec<DailyCount>>;

    async fn top_books(&self, limit: i64) -> Result<Vec<TopContent>>;

    async fn top_tutorials(&self, limit: i64) -> Result<Vec<TopContent>>;

    /// Most frequent search terms since `since`, case-insensitive
    async fn top_searches(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<SearchTerm>>;

    /// Activity feed, newest first
    async fn recent_activity(&self, params: &ListParams) -> Result<(Vec<ActivityLog>, i64)>;
}

/// SQLx-based analytics repository implementation
pub struct SqlxAnalyticsRepository {
    pool: DynDatabasePool,
}

impl SqlxAnalyticsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AnalyticsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AnalyticsRepository for SqlxAnalyticsRepository {
    async fn log_download(&self, book_id: i64, client: &ClientInfo) -> Result<()> {
        dispatch!(self.pool, db => {
            sqlx::query(
                "INSERT INTO download_logs (book_id, user_id, ip_address, user_agent, created_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(book_id)
            .bind(client.user_id)
            .bind(&client.ip_address)
            .bind(&client.user_agent)
            .bind(Utc::now())
            .execute(db)
            .await
            .context("Failed to log download")?;
        });
        Ok(())
    }

    async fn log_view(&self, target: ContentRef, client: &ClientInfo) -> Result<()> {
        dispatch!(self.pool, db => {
            sqlx::query(
                "INSERT INTO view_logs (content_type, content_id, user_id, ip_address, user_agent, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(target.content_type.as_str())
            .bind(target.content_id)
            .bind(client.user_id)
            .bind(&client.ip_address)
            .bind(&client.user_agent)
            .bind(Utc::now())
            .execute(db)
            .await
            .context("Failed to log view")?;
        });
        Ok(())
    }

    async fn log_search(&self, user_id: Option<i64>, query: &str, results_count: i64) -> Result<()> {
        dispatch!(self.pool, db => {
            sqlx::query(
                "INSERT INTO search_history (user_id, query, results_count, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(query)
            .bind(results_count)
            .bind(Utc::now())
            .execute(db)
            .await
            .context("Failed to log search")?;
        });
        Ok(())
    }

    async fn log_activity(
        &self,
        user_id: Option<i64>,
        action: &str,
        entity_type: Option<&str>,
        entity_id: Option<i64>,
        details: Option<&str>,
    ) -> Result<()> {
        dispatch!(self.pool, db => {
            sqlx::query(
                "INSERT INTO activity_logs (user_id, action, entity_type, entity_id, details, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(action)
            .bind(entity_type)
            .bind(entity_id)
            .bind(details)
            .bind(Utc::now())
            .execute(db)
            .await
            .context("Failed to log activity")?;
        });
        Ok(())
    }

    async fn totals(&self) -> Result<Totals> {
        type Row = (i64, i64, i64, i64, i64, i64, i64, i64, i64);
        let row: Row = dispatch!(self.pool, db => {
            sqlx::query_as(
                "SELECT (SELECT COUNT(*) FROM users), (SELECT COUNT(*) FROM books), \
                        (SELECT COUNT(*) FROM tutorials), (SELECT COUNT(*) FROM categories), \
                        (SELECT COUNT(*) FROM download_logs), (SELECT COUNT(*) FROM view_logs), \
                        (SELECT COUNT(*) FROM comments), (SELECT COUNT(*) FROM ratings), \
                        (SELECT COUNT(*) FROM bookmarks)",
            )
            .fetch_one(db)
            .await
            .context("Failed to load totals")?
        });
        let (users, books, tutorials, categories, downloads, views, comments, ratings, bookmarks) = row;
        Ok(Totals {
            users,
            books,
            tutorials,
            categories,
            downloads,
            views,
            comments,
            ratings,
            bookmarks,
        })
    }

    async fn daily_counts(&self, log: EventLog, since: DateTime<Utc>) -> Result<Vec<DailyCount>> {
        let sql = format!(
            "SELECT SUBSTR(CAST(created_at AS CHAR), 1, 10) AS day, COUNT(*) AS count \
             FROM {} WHERE created_at >= ? \
             GROUP BY SUBSTR(CAST(created_at AS CHAR), 1, 10) ORDER BY day",
            log.table()
        );
        let counts = dispatch!(self.pool, db => {
            sqlx::query_as::<_, DailyCount>(&sql)
                .bind(since)
                .fetch_all(db)
                .await
                .context("Failed to load daily counts")?
        });
        Ok(counts)
    }

    async fn top_books(&self, limit: i64) -> Result<Vec<TopContent>> {
        let rows = dispatch!(self.pool, db => {
            sqlx::query_as::<_, TopContent>(
                "SELECT id, title, download_count AS count FROM books \
                 WHERE download_count > 0 ORDER BY download_count DESC, id ASC LIMIT ?",
            )
            .bind(limit)
            .fetch_all(db)
            .await
            .context("Failed to load top books")?
        });
        Ok(rows)
    }

    async fn top_tutorials(&self, limit: i64) -> Result<Vec<TopContent>> {
        let rows = dispatch!(self.pool, db => {
            sqlx::query_as::<_, TopContent>(
                "SELECT id, title, view_count AS count FROM tutorials \
                 WHERE view_count > 0 ORDER BY view_count DESC, id ASC LIMIT ?",
            )
            .bind(limit)
            .fetch_all(db)
            .await
            .context("Failed to load top tutorials")?
        });
        Ok(rows)
    }

    async fn top_searches(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<SearchTerm>> {
        let rows = dispatch!(self.pool, db => {
            sqlx::query_as::<_, SearchTerm>(
                "SELECT LOWER(query) AS query, COUNT(*) AS count FROM search_history \
                 WHERE created_at >= ? GROUP BY LOWER(query) \
                 ORDER BY COUNT(*) DESC, LOWER(query) ASC LIMIT ?",
            )
            .bind(since)
            .bind(limit)
            .fetch_all(db)
            .await
            .context("Failed to load top searches")?
        });
        Ok(rows)
    }

    async fn recent_activity(&self, params: &ListParams) -> Result<(Vec<ActivityLog>, i64)> {
        let (items, total): (Vec<ActivityLog>, i64) = dispatch!(self.pool, db => {
            let total = sqlx::query_scalar("SELECT COUNT(*) FROM activity_logs")
                .fetch_one(db)
                .await
                .context("Failed to count activity")?;
            let items = sqlx::query_as::<_, ActivityLog>(
                "SELECT a.id, a.user_id, u.username, a.action, a.entity_type, a.entity_id, a.details, a.created_at \
                 FROM activity_logs a LEFT JOIN users u ON u.id = a.user_id \
                 ORDER BY a.created_at DESC, a.id DESC LIMIT ? OFFSET ?",
            )
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(db)
            .await
            .context("Failed to list activity")?;
            (items, total)
        });
        Ok((items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{BookRepository, SqlxBookRepository};
    use crate::db::test_support::{migrated_pool, seed_book, seed_category, seed_user};
    use crate::models::UserRole;

    #[tokio::test]
    async fn test_logs_feed_totals_and_daily_counts() {
        let pool = migrated_pool().await;
        let user = seed_user(&pool, "reader", UserRole::User).await;
        let category = seed_category(&pool, "Science").await;
        let book = seed_book(&pool, category, "Cosmos").await;
        let repo = SqlxAnalyticsRepository::new(pool.clone());
        let client = ClientInfo {
            user_id: Some(user),
            ip_address: Some("127.0.0.1".into()),
            user_agent: None,
        };

        repo.log_download(book, &client).await.unwrap();
        repo.log_download(book, &ClientInfo::default()).await.unwrap();
        repo.log_view(ContentRef::book(book), &client).await.unwrap();

        let totals = repo.totals().await.unwrap();
        assert_eq!(totals.users, 1);
        assert_eq!(totals.books, 1);
        assert_eq!(totals.downloads, 2);
        assert_eq!(totals.views, 1);

        let since = Utc::now() - chrono::Duration::days(1);
        let daily = repo.daily_counts(EventLog::Downloads, since).await.unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].count, 2);
        assert_eq!(daily[0].day, Utc::now().format("%Y-%m-%d").to_string());
    }

    #[tokio::test]
    async fn test_top_lists() {
        let pool = migrated_pool().await;
        let category = seed_category(&pool, "Science").await;
        let cosmos = seed_book(&pool, category, "Cosmos").await;
        seed_book(&pool, category, "Unread").await;
        let books = SqlxBookRepository::new(pool.clone());
        books.increment_download_count(cosmos).await.unwrap();
        let repo = SqlxAnalyticsRepository::new(pool);

        let top = repo.top_books(5).await.unwrap();
        assert_eq!(top, vec![TopContent { id: cosmos, title: "Cosmos".into(), count: 1 }]);
        assert!(repo.top_tutorials(5).await.unwrap().is_empty());

        let since = Utc::now() - chrono::Duration::days(1);
        repo.log_search(None, "Rust", 3).await.unwrap();
        repo.log_search(None, "rust", 3).await.unwrap();
        repo.log_search(None, "go", 0).await.unwrap();
        let searches = repo.top_searches(since, 10).await.unwrap();
        assert_eq!(searches[0], SearchTerm { query: "rust".into(), count: 2 });
        assert_eq!(searches.len(), 2);
    }

    #[tokio::test]
    async fn test_activity_feed_survives_user_delete() {
        let pool = migrated_pool().await;
        let admin = seed_user(&pool, "admin", UserRole::Admin).await;
        let repo = SqlxAnalyticsRepository::new(pool.clone());

        repo.log_activity(Some(admin), "book.create", Some("book"), Some(1), None)
            .await
            .unwrap();
        repo.log_activity(None, "user.signup", None, None, Some("anon"))
            .await
            .unwrap();

        let (feed, total) = repo.recent_activity(&ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(feed.len(), 2);
        assert!(feed.iter().any(|a| a.username.as_deref() == Some("admin")));

        pool.execute("DELETE FROM users").await.unwrap();
        let (feed, _) = repo.recent_activity(&ListParams::default()).await.unwrap();
        assert!(feed.iter().all(|a| a.user_id.is_none()));
    }
}
