//! Book API endpoints
//!
//! - GET /api/books - Paginated, filterable list
//! - GET /api/books/featured - Hero slider items
//! - GET /api/books/{id} - Detail with category, tags and rating
//! - GET /api/books/{id}/cover - Redirect to the cover image
//! - POST /api/books/{id}/download - Count a download, return the file URL
//! - POST /api/books/{id}/view - Count a view
//! - POST /api/books, PUT|DELETE /api/books/{id} - Editors and admins

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{log_activity, SuccessResponse};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser, RequestClient};
use crate::models::{
    BookDetail, BookListItem, ContentQuery, ContentRef, CreateBookInput, PagedResult, UpdateBookInput,
};

const DEFAULT_FEATURED: u32 = 5;
const MAX_FEATURED: u32 = 20;

#[derive(Debug, Default, Deserialize)]
pub struct FeaturedQuery {
    pub limit: Option<u32>,
}

impl FeaturedQuery {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_FEATURED).clamp(1, MAX_FEATURED)
    }
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub book_id: i64,
    pub file_url: String,
    pub download_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub counted: bool,
}

/// Build the public books router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books))
        .route("/books/featured", get(featured_books))
        .route("/books/{id}", get(get_book))
        .route("/books/{id}/cover", get(book_cover))
        .route("/books/{id}/download", post(download_book))
        .route("/books/{id}/view", post(view_book))
}

/// Book management routes (editor middleware applied by the caller)
pub fn editor_router() -> Router<AppState> {
    Router::new()
        .route("/books", post(create_book))
        .route("/books/{id}", put(update_book).delete(delete_book))
}

/// GET /api/books
async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<PagedResult<BookListItem>>, ApiError> {
    Ok(Json(state.book_service.list(&query).await?))
}

/// GET /api/books/featured
async fn featured_books(
    State(state): State<AppState>,
    Query(query): Query<FeaturedQuery>,
) -> Result<Json<Vec<BookListItem>>, ApiError> {
    Ok(Json(state.book_service.featured(query.limit()).await?))
}

/// GET /api/books/{id}
async fn get_book(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<BookDetail>, ApiError> {
    Ok(Json(state.book_service.get(id, viewer.id()).await?))
}

/// GET /api/books/{id}/cover
///
/// 302 to the stored cover, or to the placeholder when the book has none.
async fn book_cover(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let book = state.book_service.get_book(id).await?;
    let location = book
        .cover_image
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| state.uploads.config().placeholder_image.clone());
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]))
}

/// POST /api/books/{id}/download
async fn download_book(
    State(state): State<AppState>,
    client: RequestClient,
    Path(id): Path<i64>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let book = state.book_service.get_book(id).await?;
    let file_url = book
        .file_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ApiError::not_found(format!("Book {} has no downloadable file", id)))?;

    let book = state.analytics_service.record_download(id, &client.0).await?;
    Ok(Json(DownloadResponse {
        book_id: id,
        file_url,
        download_count: book.download_count,
    }))
}

/// POST /api/books/{id}/view
async fn view_book(
    State(state): State<AppState>,
    client: RequestClient,
    Path(id): Path<i64>,
) -> Result<Json<ViewResponse>, ApiError> {
    let counted = state
        .analytics_service
        .record_view(ContentRef::book(id), &client.0)
        .await?;
    Ok(Json(ViewResponse { counted }))
}

/// POST /api/books
async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateBookInput>,
) -> Result<(StatusCode, Json<BookDetail>), ApiError> {
    let book = state.book_service.create(body, Some(user.id)).await?;
    log_activity(&state, user.id, "create", "book", Some(book.book.id), Some(&book.book.title)).await;
    Ok((StatusCode::CREATED, Json(book)))
}

/// PUT /api/books/{id}
async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateBookInput>,
) -> Result<Json<BookDetail>, ApiError> {
    let book = state.book_service.update(id, body).await?;
    log_activity(&state, user.id, "update", "book", Some(id), Some(&book.book.title)).await;
    Ok(Json(book))
}

/// DELETE /api/books/{id}
async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.book_service.delete(id).await?;
    log_activity(&state, user.id, "delete", "book", Some(id), None).await;
    Ok(Json(SuccessResponse::ok()))
}
