//! Analytics service
//!
//! Records downloads, views, searches and admin activity, and aggregates
//! them for the admin dashboard. Views are counted once per viewer and item
//! within the dedup window; the window lives in the cache.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{
    AnalyticsRepository, BookRepository, ClientInfo, ContentRepository, EventLog, TutorialRepository,
};
use crate::models::{
    fill_daily_series, ActivityLog, AnalyticsSummary, Book, ContentRef, ContentType, ListParams,
    PagedResult, RequestStatsSnapshot,
};
use crate::services::content::detail_cache_key;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const TOP_LIMIT: i64 = 10;
const MAX_SUMMARY_DAYS: u32 = 365;

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("{0} not found")]
    ContentNotFound(ContentRef),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Request counters kept with atomics, updated by the HTTP middleware
pub struct RequestStats {
    total_requests: AtomicU64,
    client_errors: AtomicU64,
    server_errors: AtomicU64,
    total_response_time_us: AtomicU64,
    start_time: Instant,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            client_errors: AtomicU64::new(0),
            server_errors: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one finished request
    pub fn record(&self, status: u16, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        match status {
            400..=499 => {
                self.client_errors.fetch_add(1, Ordering::Relaxed);
            }
            500..=599 => {
                self.server_errors.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn snapshot(&self) -> RequestStatsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let avg_response_time_ms = if total == 0 {
            0.0
        } else {
            self.total_response_time_us.load(Ordering::Relaxed) as f64 / total as f64 / 1000.0
        };
        RequestStatsSnapshot {
            total_requests: total,
            client_errors: self.client_errors.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
            avg_response_time_ms,
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AnalyticsService {
    repo: Arc<dyn AnalyticsRepository>,
    content: Arc<dyn ContentRepository>,
    books: Arc<dyn BookRepository>,
    tutorials: Arc<dyn TutorialRepository>,
    cache: Arc<Cache>,
    view_dedup: Duration,
    request_stats: Arc<RequestStats>,
}

impl AnalyticsService {
    pub fn new(
        repo: Arc<dyn AnalyticsRepository>,
        content: Arc<dyn ContentRepository>,
        books: Arc<dyn BookRepository>,
        tutorials: Arc<dyn TutorialRepository>,
        cache: Arc<Cache>,
        view_dedup: Duration,
        request_stats: Arc<RequestStats>,
    ) -> Self {
        Self {
            repo,
            content,
            books,
            tutorials,
            cache,
            view_dedup,
            request_stats,
        }
    }

    pub fn request_stats(&self) -> &Arc<RequestStats> {
        &self.request_stats
    }

    /// Log a download and bump the book's counter; returns the book as
    /// stored after the increment
    pub async fn record_download(&self, book_id: i64, client: &ClientInfo) -> Result<Book, AnalyticsError> {
        self.books.increment_download_count(book_id).await?;
        let book = self
            .books
            .get_by_id(book_id)
            .await?
            .ok_or(AnalyticsError::ContentNotFound(ContentRef::book(book_id)))?;

        self.repo.log_download(book_id, client).await?;
        self.invalidate_detail(ContentRef::book(book_id)).await;
        Ok(book)
    }

    /// Count a view unless this viewer already viewed the item within the
    /// dedup window. Returns whether the view was counted.
    pub async fn record_view(&self, target: ContentRef, client: &ClientInfo) -> Result<bool, AnalyticsError> {
        if !self.content.exists(target).await? {
            return Err(AnalyticsError::ContentNotFound(target));
        }

        let key = view_dedup_key(target, client);
        let first = match self.cache.insert_if_absent(&key, &true, self.view_dedup).await {
            Ok(first) => first,
            Err(e) => {
                tracing::warn!("View dedup unavailable, counting view: {}", e);
                true
            }
        };
        if !first {
            return Ok(false);
        }

        self.repo.log_view(target, client).await?;
        match target.content_type {
            ContentType::Book => self.books.increment_view_count(target.content_id).await?,
            ContentType::Tutorial => self.tutorials.increment_view_count(target.content_id).await?,
        }
        self.invalidate_detail(target).await;
        Ok(true)
    }

    /// Record a search; failures are logged and swallowed
    pub async fn record_search(&self, user_id: Option<i64>, query: &str, results: i64) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        if let Err(e) = self.repo.log_search(user_id, query, results).await {
            tracing::warn!("Failed to record search '{}': {}", query, e);
        }
    }

    /// Append to the admin activity feed; failures are logged and swallowed
    pub async fn log_activity(
        &self,
        user_id: Option<i64>,
        action: &str,
        entity_type: Option<&str>,
        entity_id: Option<i64>,
        details: Option<&str>,
    ) {
        if let Err(e) = self
            .repo
            .log_activity(user_id, action, entity_type, entity_id, details)
            .await
        {
            tracing::warn!("Failed to log activity '{}': {}", action, e);
        }
    }

    /// Dashboard data for the last `days` days (1-365), today included
    pub async fn summary(&self, days: u32) -> Result<AnalyticsSummary, AnalyticsError> {
        let days = days.clamp(1, MAX_SUMMARY_DAYS);
        let now = Utc::now();
        let first_day = now.date_naive() - ChronoDuration::days(days as i64 - 1);
        let since = first_day
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc())
            .unwrap_or(now);

        let totals = self.repo.totals().await?;
        let downloads = self.repo.daily_counts(EventLog::Downloads, since).await?;
        let views = self.repo.daily_counts(EventLog::Views, since).await?;

        Ok(AnalyticsSummary {
            days,
            totals,
            daily_downloads: fill_daily_series(downloads, days, now),
            daily_views: fill_daily_series(views, days, now),
            top_books: self.repo.top_books(TOP_LIMIT).await?,
            top_tutorials: self.repo.top_tutorials(TOP_LIMIT).await?,
            top_searches: self.repo.top_searches(since, TOP_LIMIT).await?,
            requests: self.request_stats.snapshot(),
        })
    }

    pub async fn recent_activity(&self, params: &ListParams) -> Result<PagedResult<ActivityLog>, AnalyticsError> {
        let (items, total) = self.repo.recent_activity(params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    async fn invalidate_detail(&self, target: ContentRef) {
        if let Err(e) = self.cache.delete(&detail_cache_key(target)).await {
            tracing::warn!("Failed to invalidate {}: {}", target, e);
        }
    }
}

/// Signed-in viewers are keyed by id, anonymous ones by a hash of IP and user agent
fn view_dedup_key(target: ContentRef, client: &ClientInfo) -> String {
    let viewer = match client.user_id {
        Some(id) => format!("u{}", id),
        None => {
            let fingerprint = format!(
                "{}|{}",
                client.ip_address.as_deref().unwrap_or(""),
                client.user_agent.as_deref().unwrap_or("")
            );
            format!("a{:x}", md5::compute(fingerprint.as_bytes()))
        }
    };
    format!("view:{}:{}", viewer, target)
}
