//! Shared plumbing for book and tutorial repositories
//!
//! Both catalogs are listed with the same filters and sort orders, and both
//! own polymorphic rows in the engagement tables that must be removed
//! together with the item.

use crate::db::{dispatch, like_pattern, DynDatabasePool, SqlArg};
use crate::models::{ContentQuery, ContentRef, ContentSort, ContentType, TutorialLevel};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Rows keyed by `(content_type, content_id)` that belong to one item.
/// Each statement takes the content type and id as its two parameters.
pub(crate) const CONTENT_CLEANUP_SQL: [&str; 7] = [
    "DELETE FROM ratings WHERE content_type = ? AND content_id = ?",
    "DELETE FROM bookmarks WHERE content_type = ? AND content_id = ?",
    "DELETE FROM comments WHERE content_type = ? AND content_id = ?",
    "DELETE FROM reading_history WHERE content_type = ? AND content_id = ?",
    "DELETE FROM content_tags WHERE content_type = ? AND content_id = ?",
    "DELETE FROM course_items WHERE content_type = ? AND content_id = ?",
    "DELETE FROM view_logs WHERE content_type = ? AND content_id = ?",
];

/// Listing filters after the category id/slug has been resolved
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub search: Option<String>,
    pub category_id: Option<i64>,
    pub tag: Option<String>,
    pub featured: Option<bool>,
    pub level: Option<TutorialLevel>,
    pub sort: ContentSort,
}

impl ContentFilter {
    pub fn from_query(query: &ContentQuery, category_id: Option<i64>) -> Self {
        Self {
            search: query.search_term().map(str::to_string),
            category_id,
            tag: query.tag.clone().filter(|t| !t.trim().is_empty()),
            featured: query.featured,
            level: query.level,
            sort: query.sort,
        }
    }
}

/// SQL fragments for a listing query over `books i` or `tutorials i`
#[derive(Debug)]
pub(crate) struct ListingSql {
    /// `SELECT ...` column list including category and vote counters
    pub select: String,
    /// `FROM ... WHERE ...`
    pub from_where: String,
    pub order_by: &'static str,
    pub args: Vec<SqlArg>,
}

pub(crate) fn listing_sql(kind: ContentType, filter: &ContentFilter) -> ListingSql {
    let type_literal = kind.as_str();
    let select = format!(
        "SELECT i.*, c.name AS category_name, c.slug AS category_slug, \
                (SELECT COUNT(*) FROM ratings r WHERE r.content_type = '{t}' AND r.content_id = i.id AND r.vote = 1) AS likes, \
                (SELECT COUNT(*) FROM ratings r WHERE r.content_type = '{t}' AND r.content_id = i.id AND r.vote = -1) AS dislikes",
        t = type_literal
    );

    let mut clauses: Vec<String> = Vec::new();
    let mut args = Vec::new();

    if let Some(term) = filter.search.as_deref() {
        let byline = match kind {
            ContentType::Book => "i.author",
            ContentType::Tutorial => "COALESCE(i.instructor, '')",
        };
        clauses.push(format!(
            "(LOWER(i.title) LIKE ? ESCAPE '!' OR LOWER({}) LIKE ? ESCAPE '!' \
             OR LOWER(COALESCE(i.description, '')) LIKE ? ESCAPE '!')",
            byline
        ));
        let pattern = like_pattern(term);
        args.extend(std::iter::repeat(SqlArg::Text(pattern)).take(3));
    }
    if let Some(category_id) = filter.category_id {
        clauses.push("i.category_id = ?".to_string());
        args.push(SqlArg::Int(category_id));
    }
    if let Some(tag) = filter.tag.as_deref() {
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM content_tags ct JOIN tags tg ON tg.id = ct.tag_id \
             WHERE ct.content_type = '{}' AND ct.content_id = i.id AND tg.slug = ?)",
            type_literal
        ));
        args.push(SqlArg::Text(tag.trim().to_lowercase()));
    }
    if let Some(featured) = filter.featured {
        clauses.push("i.is_featured = ?".to_string());
        args.push(SqlArg::Bool(featured));
    }
    if let (ContentType::Tutorial, Some(level)) = (kind, filter.level) {
        clauses.push("i.level = ?".to_string());
        args.push(SqlArg::Text(level.as_str().to_string()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let from_where = format!(
        "FROM {} i JOIN categories c ON c.id = i.category_id{}",
        kind.table(),
        where_sql
    );

    let order_by = match (filter.sort, kind) {
        (ContentSort::Newest, _) => "ORDER BY i.created_at DESC, i.id DESC",
        (ContentSort::Oldest, _) => "ORDER BY i.created_at ASC, i.id ASC",
        (ContentSort::Title, _) => "ORDER BY LOWER(i.title) ASC, i.id ASC",
        (ContentSort::Popular, ContentType::Book) => "ORDER BY i.download_count DESC, i.view_count DESC, i.id DESC",
        (ContentSort::Popular, ContentType::Tutorial) => "ORDER BY i.view_count DESC, i.id DESC",
        (ContentSort::Rating, ContentType::Book) => {
            "ORDER BY (SELECT COALESCE(SUM(r.vote), 0) FROM ratings r \
             WHERE r.content_type = 'book' AND r.content_id = i.id) DESC, i.id DESC"
        }
        (ContentSort::Rating, ContentType::Tutorial) => {
            "ORDER BY (SELECT COALESCE(SUM(r.vote), 0) FROM ratings r \
             WHERE r.content_type = 'tutorial' AND r.content_id = i.id) DESC, i.id DESC"
        }
    };

    ListingSql {
        select,
        from_where,
        order_by,
        args,
    }
}

/// Existence checks used before writing polymorphic rows
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// True when the referenced book or tutorial exists
    async fn exists(&self, target: ContentRef) -> Result<bool>;

    /// Title of the referenced item
    async fn title(&self, target: ContentRef) -> Result<Option<String>>;
}

/// SQLx-based content lookup
pub struct SqlxContentRepository {
    pool: DynDatabasePool,
}

impl SqlxContentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ContentRepository for SqlxContentRepository {
    async fn exists(&self, target: ContentRef) -> Result<bool> {
        Ok(self.title(target).await?.is_some())
    }

    async fn title(&self, target: ContentRef) -> Result<Option<String>> {
        let sql = format!("SELECT title FROM {} WHERE id = ?", target.content_type.table());
        let title: Option<String> = dispatch!(self.pool, db => {
            sqlx::query_scalar(&sql)
                .bind(target.content_id)
                .fetch_optional(db)
                .await
                .with_context(|| format!("Failed to look up {}", target))?
        });
        Ok(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{migrated_pool, seed_book, seed_category};

    #[test]
    fn test_listing_sql_without_filters() {
        let sql = listing_sql(ContentType::Book, &ContentFilter::default());

        assert!(sql.from_where.starts_with("FROM books i JOIN categories c"));
        assert!(!sql.from_where.contains("WHERE"));
        assert!(sql.args.is_empty());
        assert!(sql.order_by.contains("created_at DESC"));
    }

    #[test]
    fn test_listing_sql_binds_in_clause_order() {
        let filter = ContentFilter {
            search: Some("rust".into()),
            category_id: Some(4),
            tag: Some("Systems".into()),
            featured: Some(true),
            level: Some(TutorialLevel::Advanced),
            sort: ContentSort::Popular,
        };

        let sql = listing_sql(ContentType::Tutorial, &filter);

        assert_eq!(
            sql.args,
            vec![
                SqlArg::Text("%rust%".into()),
                SqlArg::Text("%rust%".into()),
                SqlArg::Text("%rust%".into()),
                SqlArg::Int(4),
                SqlArg::Text("systems".into()),
                SqlArg::Bool(true),
                SqlArg::Text("advanced".into()),
            ]
        );
        assert_eq!(sql.from_where.matches('?').count(), sql.args.len());
        assert!(sql.order_by.contains("view_count"));
    }

    #[test]
    fn test_level_ignored_for_books() {
        let filter = ContentFilter {
            level: Some(TutorialLevel::Beginner),
            ..Default::default()
        };
        assert!(listing_sql(ContentType::Book, &filter).args.is_empty());
    }

    #[tokio::test]
    async fn test_exists_and_title() {
        let pool = migrated_pool().await;
        let category = seed_category(&pool, "Fiction").await;
        let book = seed_book(&pool, category, "Emma").await;
        let repo = SqlxContentRepository::new(pool);

        assert!(repo.exists(ContentRef::book(book)).await.unwrap());
        assert!(!repo.exists(ContentRef::tutorial(book)).await.unwrap());
        assert_eq!(
            repo.title(ContentRef::book(book)).await.unwrap().as_deref(),
            Some("Emma")
        );
    }
}
