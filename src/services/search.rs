//! Catalog search across books and tutorials

use crate::models::{BookListItem, ContentQuery, ContentType, TutorialListItem};
use crate::services::analytics::AnalyticsService;
use crate::services::book::BookService;
use crate::services::content::ContentServiceError;
use crate::services::tutorial::TutorialService;
use serde::Serialize;
use std::sync::Arc;

const MAX_QUERY_LEN: usize = 200;

/// Matches per kind; a kind excluded by the `type` filter stays empty
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub books: Vec<BookListItem>,
    pub tutorials: Vec<TutorialListItem>,
    pub total_books: i64,
    pub total_tutorials: i64,
}

pub struct SearchService {
    books: Arc<BookService>,
    tutorials: Arc<TutorialService>,
    analytics: Arc<AnalyticsService>,
}

impl SearchService {
    pub fn new(books: Arc<BookService>, tutorials: Arc<TutorialService>, analytics: Arc<AnalyticsService>) -> Self {
        Self {
            books,
            tutorials,
            analytics,
        }
    }

    /// Search titles, authors/instructors and descriptions and record the
    /// query in the search history
    pub async fn search(
        &self,
        query: &str,
        kind: Option<ContentType>,
        per_page: u32,
        user_id: Option<i64>,
    ) -> Result<SearchResults, ContentServiceError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ContentServiceError::ValidationError("Search query is required".into()));
        }
        if query.chars().count() > MAX_QUERY_LEN {
            return Err(ContentServiceError::ValidationError(format!(
                "Search query cannot exceed {} characters",
                MAX_QUERY_LEN
            )));
        }

        let content_query = ContentQuery {
            search: Some(query.to_string()),
            per_page: Some(per_page),
            ..Default::default()
        };

        let mut results = SearchResults {
            query: query.to_string(),
            books: Vec::new(),
            tutorials: Vec::new(),
            total_books: 0,
            total_tutorials: 0,
        };
        if kind != Some(ContentType::Tutorial) {
            let page = self.books.list(&content_query).await?;
            results.total_books = page.total;
            results.books = page.items;
        }
        if kind != Some(ContentType::Book) {
            let page = self.tutorials.list(&content_query).await?;
            results.total_tutorials = page.total;
            results.tutorials = page.items;
        }

        self.analytics
            .record_search(user_id, query, results.total_books + results.total_tutorials)
            .await;
        Ok(results)
    }
}
