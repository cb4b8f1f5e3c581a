//! Search API endpoint
//!
//! - GET /api/search?q=&type=book|tutorial&per_page=

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, MaybeUser};
use crate::models::ContentType;
use crate::services::SearchResults;

const DEFAULT_PER_KIND: u32 = 12;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    /// `book`, `tutorial`, or `all`/absent for both
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub per_page: Option<u32>,
}

impl SearchQuery {
    fn content_type(&self) -> Result<Option<ContentType>, ApiError> {
        match self.kind.as_deref().map(str::trim) {
            None | Some("") | Some("all") => Ok(None),
            Some(kind) => kind
                .parse()
                .map(Some)
                .map_err(|_| ApiError::validation_error(format!("Unknown search type: {}", kind))),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/search", get(search))
}

/// GET /api/search
async fn search(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResults>, ApiError> {
    let kind = query.content_type()?;
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_KIND).clamp(1, 100);
    let results = state
        .search_service
        .search(&query.q, kind, per_page, viewer.id())
        .await?;
    Ok(Json(results))
}
