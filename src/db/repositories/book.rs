//! Book repository
//!
//! Database operations for books, their listing queries and counters.

use super::content::{listing_sql, ContentFilter, CONTENT_CLEANUP_SQL};
use crate::db::{bind_args, dispatch, DynDatabasePool, InsertedId, SqlArg};
use crate::models::{Book, BookListItem, ContentType, CreateBookInput, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Book repository trait
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Insert a book; `cover_image` must already be a stored URL
    async fn create(&self, input: &CreateBookInput, created_by: Option<i64>) -> Result<Book>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Book>>;

    /// Filtered, sorted page of books with category and vote counters
    async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<(Vec<BookListItem>, i64)>;

    /// Persist every editable column of `book`
    async fn update(&self, book: &Book) -> Result<Book>;

    /// Delete the book and every polymorphic row pointing at it, atomically
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn increment_download_count(&self, id: i64) -> Result<()>;

    async fn increment_view_count(&self, id: i64) -> Result<()>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based book repository implementation
pub struct SqlxBookRepository {
    pool: DynDatabasePool,
}

impl SqlxBookRepository {
    /// Create a new SQLx book repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BookRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl BookRepository for SqlxBookRepository {
    async fn create(&self, input: &CreateBookInput, created_by: Option<i64>) -> Result<Book> {
        let now = Utc::now();
        let id = dispatch!(self.pool, db => {
            sqlx::query(
                "INSERT INTO books (title, author, description, category_id, cover_image, file_url, file_size, \
                                    pages, language, isbn, publisher, published_year, is_featured, created_by, \
                                    created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&input.title)
            .bind(&input.author)
            .bind(&input.description)
            .bind(input.category_id)
            .bind(&input.cover_image)
            .bind(&input.file_url)
            .bind(input.file_size)
            .bind(input.pages)
            .bind(&input.language)
            .bind(&input.isbn)
            .bind(&input.publisher)
            .bind(input.published_year)
            .bind(input.is_featured)
            .bind(created_by)
            .bind(now)
            .bind(now)
            .execute(db)
            .await
            .context("Failed to create book")?
            .inserted_id()
        });

        self.get_by_id(id).await?.context("Book not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Book>> {
        let book = dispatch!(self.pool, db => {
            sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ?")
                .bind(id)
                .fetch_optional(db)
                .await
                .context("Failed to get book")?
        });
        Ok(book)
    }

    async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<(Vec<BookListItem>, i64)> {
        let sql = listing_sql(ContentType::Book, filter);
        let count_sql = format!("SELECT COUNT(*) {}", sql.from_where);
        let list_sql = format!(
            "{} {} {} LIMIT ? OFFSET ?",
            sql.select, sql.from_where, sql.order_by
        );
        let mut page_args = sql.args.clone();
        page_args.push(SqlArg::Int(params.limit()));
        page_args.push(SqlArg::Int(params.offset()));

        let (items, total): (Vec<BookListItem>, i64) = dispatch!(self.pool, db => {
            let total = bind_args!(sqlx::query_scalar(&count_sql), sql.args)
                .fetch_one(db)
                .await
                .context("Failed to count books")?;
            let items = bind_args!(sqlx::query_as::<_, BookListItem>(&list_sql), page_args)
                .fetch_all(db)
                .await
                .context("Failed to list books")?;
            (items, total)
        });

        Ok((items, total))
    }

    async fn update(&self, book: &Book) -> Result<Book> {
        dispatch!(self.pool, db => {
            sqlx::query(
                "UPDATE books SET title = ?, author = ?, description = ?, category_id = ?, cover_image = ?, \
                                  file_url = ?, file_size = ?, pages = ?, language = ?, isbn = ?, publisher = ?, \
                                  published_year = ?, is_featured = ?, updated_at = ? \
                 WHERE id = ?",
            )
            .bind(&book.title)
            .bind(&book.author)
            .bind(&book.description)
            .bind(book.category_id)
            .bind(&book.cover_image)
            .bind(&book.file_url)
            .bind(book.file_size)
            .bind(book.pages)
            .bind(&book.language)
            .bind(&book.isbn)
            .bind(&book.publisher)
            .bind(book.published_year)
            .bind(book.is_featured)
            .bind(Utc::now())
            .bind(book.id)
            .execute(db)
            .await
            .context("Failed to update book")?;
        });

        self.get_by_id(book.id).await?.context("Book not found after update")
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let content_type = ContentType::Book.as_str();
        let affected = dispatch!(self.pool, db => {
            let mut tx = db.begin().await.context("Failed to begin transaction")?;
            for statement in CONTENT_CLEANUP_SQL {
                sqlx::query(statement)
                    .bind(content_type)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("Failed to clean up book {}", id))?;
            }
            let affected = sqlx::query("DELETE FROM books WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete book")?
                .rows_affected();
            tx.commit().await.context("Failed to commit book deletion")?;
            affected
        });
        Ok(affected > 0)
    }

    async fn increment_download_count(&self, id: i64) -> Result<()> {
        dispatch!(self.pool, db => {
            sqlx::query("UPDATE books SET download_count = download_count + 1 WHERE id = ?")
                .bind(id)
                .execute(db)
                .await
                .context("Failed to increment download count")?;
        });
        Ok(())
    }

    async fn increment_view_count(&self, id: i64) -> Result<()> {
        dispatch!(self.pool, db => {
            sqlx::query("UPDATE books SET view_count = view_count + 1 WHERE id = ?")
                .bind(id)
                .execute(db)
                .await
                .context("Failed to increment book view count")?;
        });
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = dispatch!(self.pool, db => {
            sqlx::query_scalar("SELECT COUNT(*) FROM books")
                .fetch_one(db)
                .await
                .context("Failed to count books")?
        });
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{migrated_pool, seed_category, seed_user};
    use crate::models::{ContentSort, UserRole};

    async fn setup() -> (DynDatabasePool, SqlxBookRepository, i64) {
        let pool = migrated_pool().await;
        let category = seed_category(&pool, "Programming").await;
        (pool.clone(), SqlxBookRepository::new(pool), category)
    }

    fn input(title: &str, author: &str, category_id: i64) -> CreateBookInput {
        CreateBookInput {
            title: title.to_string(),
            author: author.to_string(),
            category_id,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_pool, repo, category) = setup().await;
        let mut book_input = input("The Rust Book", "Klabnik", category);
        book_input.pages = Some(550);
        book_input.is_featured = true;

        let book = repo.create(&book_input, None).await.unwrap();

        assert_eq!(book.title, "The Rust Book");
        assert_eq!(book.pages, Some(550));
        assert!(book.is_featured);
        assert_eq!(book.download_count, 0);
        assert_eq!(repo.get_by_id(book.id).await.unwrap().unwrap().author, "Klabnik");
    }

    #[tokio::test]
    async fn test_list_search_sort_and_paging() {
        let (_pool, repo, category) = setup().await;
        repo.create(&input("Zero to Production", "Palmieri", category), None).await.unwrap();
        repo.create(&input("Rust in Action", "McNamara", category), None).await.unwrap();
        repo.create(&input("Atomic Habits", "Clear", category), None).await.unwrap();

        let filter = ContentFilter {
            sort: ContentSort::Title,
            ..Default::default()
        };
        let (items, total) = repo.list(&filter, &ListParams::new(1, 2)).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].book.title, "Atomic Habits");
        assert_eq!(items[0].category_name, "Programming");

        let filter = ContentFilter {
            search: Some("mcnamara".into()),
            ..Default::default()
        };
        let (items, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].book.title, "Rust in Action");
    }

    #[tokio::test]
    async fn test_popular_sort_uses_downloads() {
        let (_pool, repo, category) = setup().await;
        let quiet = repo.create(&input("Quiet", "A", category), None).await.unwrap();
        let loud = repo.create(&input("Loud", "B", category), None).await.unwrap();
        repo.increment_download_count(loud.id).await.unwrap();
        repo.increment_download_count(loud.id).await.unwrap();

        let filter = ContentFilter {
            sort: ContentSort::Popular,
            ..Default::default()
        };
        let (items, _) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(items[0].book.id, loud.id);
        assert_eq!(items[0].book.download_count, 2);
        assert_eq!(items[1].book.id, quiet.id);
    }

    #[tokio::test]
    async fn test_delete_removes_polymorphic_rows() {
        let (pool, repo, category) = setup().await;
        let user = seed_user(&pool, "reader", UserRole::User).await;
        let book = repo.create(&input("Doomed", "X", category), None).await.unwrap();
        let db = pool.as_sqlite().unwrap();
        let now = Utc::now();

        sqlx::query("INSERT INTO bookmarks (user_id, content_type, content_id, created_at) VALUES (?, 'book', ?, ?)")
            .bind(user)
            .bind(book.id)
            .bind(now)
            .execute(db)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO ratings (user_id, content_type, content_id, vote, created_at, updated_at) VALUES (?, 'book', ?, 1, ?, ?)",
        )
        .bind(user)
        .bind(book.id)
        .bind(now)
        .bind(now)
        .execute(db)
        .await
        .unwrap();

        assert!(repo.delete(book.id).await.unwrap());

        let leftovers: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM bookmarks) + (SELECT COUNT(*) FROM ratings)",
        )
        .fetch_one(db)
        .await
        .unwrap();
        assert_eq!(leftovers, 0);
        assert!(repo.get_by_id(book.id).await.unwrap().is_none());
        assert!(!repo.delete(book.id).await.unwrap());
    }
}
