//! Common API utilities and shared types
//!
//! This module contains shared utilities used across multiple API endpoints.

use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{ContentRef, ContentType, ListParams};

/// `?page=&per_page=` for plain list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn params(&self) -> ListParams {
        ListParams::from_query(self.page, self.per_page)
    }
}

/// Body of endpoints that only report success
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Parse `/{content_type}/{content_id}` path segments
///
/// Accepts `book`/`tutorial` and their plurals.
pub fn content_ref(content_type: &str, content_id: i64) -> Result<ContentRef, ApiError> {
    let content_type: ContentType = content_type
        .parse()
        .map_err(|_| ApiError::validation_error(format!("Unknown content type: {}", content_type)))?;
    Ok(ContentRef::new(content_type, content_id))
}

/// Append an entry to the admin activity feed
pub async fn log_activity(
    state: &AppState,
    user_id: i64,
    action: &str,
    entity_type: &str,
    entity_id: Option<i64>,
    details: Option<&str>,
) {
    state
        .analytics_service
        .log_activity(Some(user_id), action, Some(entity_type), entity_id, details)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_ref_parsing() {
        assert_eq!(content_ref("book", 3).unwrap(), ContentRef::book(3));
        assert_eq!(content_ref("tutorials", 4).unwrap(), ContentRef::tutorial(4));
        let err = content_ref("article", 1).unwrap_err();
        assert_eq!(err.error.code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_page_query_defaults() {
        assert_eq!(PageQuery::default().params(), ListParams::default());
        let query = PageQuery {
            page: Some(0),
            per_page: Some(1000),
        };
        assert_eq!(query.params(), ListParams::new(1, 100));
    }
}
