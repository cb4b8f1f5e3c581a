//! Analytics read models for the admin dashboard

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Entry of the admin activity feed
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActivityLog {
    pub id: i64,
    /// `None` for anonymous actors and deleted accounts
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Event count for one calendar day (`YYYY-MM-DD`, UTC)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DailyCount {
    pub day: String,
    pub count: i64,
}

/// Item ranked by downloads or views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TopContent {
    pub id: i64,
    pub title: String,
    pub count: i64,
}

/// Frequently searched term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SearchTerm {
    pub query: String,
    pub count: i64,
}

/// Catalog and engagement totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub users: i64,
    pub books: i64,
    pub tutorials: i64,
    pub categories: i64,
    pub downloads: i64,
    pub views: i64,
    pub comments: i64,
    pub ratings: i64,
    pub bookmarks: i64,
}

/// Payload of `GET /api/admin/analytics`
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    /// Length of the reporting window in days
    pub days: u32,
    pub totals: Totals,
    pub daily_downloads: Vec<DailyCount>,
    pub daily_views: Vec<DailyCount>,
    pub top_books: Vec<TopContent>,
    pub top_tutorials: Vec<TopContent>,
    pub top_searches: Vec<SearchTerm>,
    pub requests: RequestStatsSnapshot,
}

/// HTTP traffic since the server started
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RequestStatsSnapshot {
    pub total_requests: u64,
    pub client_errors: u64,
    pub server_errors: u64,
    pub avg_response_time_ms: f64,
    pub uptime_seconds: u64,
}

/// Fill the gaps of a sparse per-day series so every day in the window
/// appears, oldest first
pub fn fill_daily_series(sparse: Vec<DailyCount>, days: u32, today: DateTime<Utc>) -> Vec<DailyCount> {
    let today = today.date_naive();
    (0..days as i64)
        .rev()
        .map(|offset| {
            let day = (today - chrono::Duration::days(offset)).format("%Y-%m-%d").to_string();
            let count = sparse
                .iter()
                .find(|d| d.day == day)
                .map(|d| d.count)
                .unwrap_or(0);
            DailyCount { day, count }
        })
        .collect()
}
