//! Book service
//!
//! Catalog operations for books: filtered listing, detail with category,
//! tags and rating summary, and editor CRUD. Cover images sent as `data:`
//! URLs are stored through the upload store.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{BookRepository, ContentFilter, RatingRepository, TagRepository};
use crate::models::{
    Book, BookDetail, BookListItem, ContentQuery, ContentRef, CreateBookInput, ListParams,
    PagedResult, RatingSummary, UpdateBookInput,
};
use crate::services::category::{CategoryService, CACHE_KEY_CATEGORY_LIST};
use crate::services::content::{
    detail_cache_key, ensure_category, normalize_tags, optional_text, require_text,
    resolve_category_filter, store_image, ContentServiceError, MAX_TITLE_LEN,
};
use crate::services::upload::UploadStore;
use anyhow::Context;
use std::sync::Arc;

pub struct BookService {
    repo: Arc<dyn BookRepository>,
    tags: Arc<dyn TagRepository>,
    ratings: Arc<dyn RatingRepository>,
    categories: Arc<CategoryService>,
    uploads: Arc<UploadStore>,
    cache: Arc<Cache>,
}

impl BookService {
    pub fn new(
        repo: Arc<dyn BookRepository>,
        tags: Arc<dyn TagRepository>,
        ratings: Arc<dyn RatingRepository>,
        categories: Arc<CategoryService>,
        uploads: Arc<UploadStore>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            repo,
            tags,
            ratings,
            categories,
            uploads,
            cache,
        }
    }

    pub async fn list(&self, query: &ContentQuery) -> Result<PagedResult<BookListItem>, ContentServiceError> {
        let params = ListParams::from_query(query.page, query.per_page);
        let Some(category_id) = resolve_category_filter(&self.categories, query).await? else {
            return Ok(PagedResult::new(Vec::new(), 0, &params));
        };

        let filter = ContentFilter::from_query(query, category_id);
        let (items, total) = self.repo.list(&filter, &params).await.context("Failed to list books")?;
        Ok(PagedResult::new(items, total, &params))
    }

    /// Newest featured books for the hero slider
    pub async fn featured(&self, limit: u32) -> Result<Vec<BookListItem>, ContentServiceError> {
        let filter = ContentFilter {
            featured: Some(true),
            ..Default::default()
        };
        let (items, _) = self.repo.list(&filter, &ListParams::new(1, limit)).await?;
        Ok(items)
    }

    pub async fn get_book(&self, id: i64) -> Result<Book, ContentServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(ContentServiceError::NotFound(ContentRef::book(id)))
    }

    /// Full detail; `viewer` fills in `rating.user_vote`
    pub async fn get(&self, id: i64, viewer: Option<i64>) -> Result<BookDetail, ContentServiceError> {
        let target = ContentRef::book(id);
        let key = detail_cache_key(target);

        let mut detail = match self.cache.get::<BookDetail>(&key).await {
            Ok(Some(cached)) => cached,
            _ => {
                let book = self.get_book(id).await?;
                let category = self.categories.get_by_id(book.category_id).await?;
                let tags = self.tags.list_for_content(target).await?;
                let detail = BookDetail {
                    book,
                    category,
                    tags,
                    rating: RatingSummary::new(target, 0, 0, None),
                };
                if let Err(e) = self.cache.set_default(&key, &detail).await {
                    tracing::warn!("Failed to cache {}: {}", target, e);
                }
                detail
            }
        };

        // Votes change far more often than the item itself
        let (likes, dislikes) = self.ratings.counts(target).await?;
        let user_vote = match viewer {
            Some(user_id) => self.ratings.user_vote(user_id, target).await?,
            None => None,
        };
        detail.rating = RatingSummary::new(target, likes, dislikes, user_vote);
        Ok(detail)
    }

    pub async fn create(&self, input: CreateBookInput, created_by: Option<i64>) -> Result<BookDetail, ContentServiceError> {
        let tags = normalize_tags(&input.tags)?;
        let mut input = CreateBookInput {
            title: require_text("Title", &input.title, MAX_TITLE_LEN)?,
            author: require_text("Author", &input.author, MAX_TITLE_LEN)?,
            description: optional_text(input.description),
            language: optional_text(input.language),
            isbn: optional_text(input.isbn),
            publisher: optional_text(input.publisher),
            file_url: optional_text(input.file_url),
            ..input
        };
        validate_numbers(input.pages, input.published_year, input.file_size)?;
        ensure_category(&self.categories, input.category_id).await?;
        input.cover_image = store_image(&self.uploads, input.cover_image.take()).await?;

        let book = self.repo.create(&input, created_by).await.context("Failed to create book")?;
        self.tags.set_for_content(ContentRef::book(book.id), &tags).await?;

        self.invalidate(book.id).await;
        tracing::info!("Created book {} '{}'", book.id, book.title);
        self.get(book.id, None).await
    }

    pub async fn update(&self, id: i64, input: UpdateBookInput) -> Result<BookDetail, ContentServiceError> {
        let mut book = self.get_book(id).await?;

        if let Some(title) = input.title {
            book.title = require_text("Title", &title, MAX_TITLE_LEN)?;
        }
        if let Some(author) = input.author {
            book.author = require_text("Author", &author, MAX_TITLE_LEN)?;
        }
        if let Some(category_id) = input.category_id {
            ensure_category(&self.categories, category_id).await?;
            book.category_id = category_id;
        }
        if input.description.is_some() {
            book.description = optional_text(input.description);
        }
        if input.cover_image.is_some() {
            book.cover_image = store_image(&self.uploads, input.cover_image).await?;
        }
        if input.file_url.is_some() {
            book.file_url = optional_text(input.file_url);
        }
        if input.language.is_some() {
            book.language = optional_text(input.language);
        }
        if input.isbn.is_some() {
            book.isbn = optional_text(input.isbn);
        }
        if input.publisher.is_some() {
            book.publisher = optional_text(input.publisher);
        }
        book.file_size = input.file_size.or(book.file_size);
        book.pages = input.pages.or(book.pages);
        book.published_year = input.published_year.or(book.published_year);
        book.is_featured = input.is_featured.unwrap_or(book.is_featured);
        validate_numbers(book.pages, book.published_year, book.file_size)?;

        self.repo.update(&book).await.context("Failed to update book")?;
        if let Some(tags) = input.tags {
            let tags = normalize_tags(&tags)?;
            self.tags.set_for_content(ContentRef::book(id), &tags).await?;
        }

        self.invalidate(id).await;
        self.get(id, None).await
    }

    /// Delete a book with its ratings, bookmarks, comments, history, tags
    /// and course entries
    pub async fn delete(&self, id: i64) -> Result<(), ContentServiceError> {
        if !self.repo.delete(id).await? {
            return Err(ContentServiceError::NotFound(ContentRef::book(id)));
        }
        self.invalidate(id).await;
        tracing::info!("Deleted book {}", id);
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, ContentServiceError> {
        Ok(self.repo.count().await?)
    }

    async fn invalidate(&self, id: i64) {
        for key in [detail_cache_key(ContentRef::book(id)), CACHE_KEY_CATEGORY_LIST.to_string()] {
            if let Err(e) = self.cache.delete(&key).await {
                tracing::warn!("Failed to invalidate {}: {}", key, e);
            }
        }
    }
}

fn validate_numbers(pages: Option<i32>, year: Option<i32>, file_size: Option<i64>) -> Result<(), ContentServiceError> {
    if pages.is_some_and(|p| p < 0) {
        return Err(ContentServiceError::ValidationError("Pages cannot be negative".into()));
    }
    if year.is_some_and(|y| !(0..=9999).contains(&y)) {
        return Err(ContentServiceError::ValidationError("Published year is out of range".into()));
    }
    if file_size.is_some_and(|s| s < 0) {
        return Err(ContentServiceError::ValidationError("File size cannot be negative".into()));
    }
    Ok(())
}
