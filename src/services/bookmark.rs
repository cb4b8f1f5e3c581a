//! Bookmarks ("my library")

use crate::db::repositories::{BookmarkRepository, ContentRepository};
use crate::models::{BookmarkItem, BookmarkState, ContentRef, ListParams, PagedResult};
use crate::services::engagement::{ensure_content_exists, EngagementError};
use std::sync::Arc;

pub struct BookmarkService {
    repo: Arc<dyn BookmarkRepository>,
    content: Arc<dyn ContentRepository>,
}

impl BookmarkService {
    pub fn new(repo: Arc<dyn BookmarkRepository>, content: Arc<dyn ContentRepository>) -> Self {
        Self { repo, content }
    }

    /// Add the bookmark if missing, otherwise remove it
    pub async fn toggle(&self, user_id: i64, target: ContentRef) -> Result<BookmarkState, EngagementError> {
        if self.repo.exists(user_id, target).await? {
            self.remove(user_id, target).await
        } else {
            self.add(user_id, target).await
        }
    }

    /// Idempotent add
    pub async fn add(&self, user_id: i64, target: ContentRef) -> Result<BookmarkState, EngagementError> {
        ensure_content_exists(self.content.as_ref(), target).await?;
        self.repo.add(user_id, target).await?;
        Ok(state(target, true))
    }

    /// Idempotent remove
    pub async fn remove(&self, user_id: i64, target: ContentRef) -> Result<BookmarkState, EngagementError> {
        self.repo.remove(user_id, target).await?;
        Ok(state(target, false))
    }

    pub async fn is_bookmarked(&self, user_id: i64, target: ContentRef) -> Result<bool, EngagementError> {
        Ok(self.repo.exists(user_id, target).await?)
    }

    /// Newest first
    pub async fn list_for_user(
        &self,
        user_id: i64,
        params: &ListParams,
    ) -> Result<PagedResult<BookmarkItem>, EngagementError> {
        let (items, total) = self.repo.list_for_user(user_id, params).await?;
        Ok(PagedResult::new(items, total, params))
    }
}

fn state(target: ContentRef, bookmarked: bool) -> BookmarkState {
    BookmarkState {
        content_type: target.content_type,
        content_id: target.content_id,
        bookmarked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxBookmarkRepository, SqlxContentRepository};
    use crate::db::test_support::{migrated_pool, seed_book, seed_category, seed_tutorial, seed_user};
    use crate::models::UserRole;

    #[tokio::test]
    async fn test_toggle_add_remove_and_list() {
        let pool = migrated_pool().await;
        let service = BookmarkService::new(
            SqlxBookmarkRepository::boxed(pool.clone()),
            SqlxContentRepository::boxed(pool.clone()),
        );
        let user = seed_user(&pool, "reader", UserRole::User).await;
        let category = seed_category(&pool, "Science").await;
        let book = ContentRef::book(seed_book(&pool, category, "Cosmos").await);
        let tutorial = ContentRef::tutorial(seed_tutorial(&pool, category, "Stars 101").await);

        assert!(service.toggle(user, book).await.unwrap().bookmarked);
        assert!(service.is_bookmarked(user, book).await.unwrap());
        assert!(!service.toggle(user, book).await.unwrap().bookmarked);
        assert!(!service.is_bookmarked(user, book).await.unwrap());

        service.add(user, book).await.unwrap();
        service.add(user, book).await.unwrap();
        service.add(user, tutorial).await.unwrap();

        let page = service.list_for_user(user, &ListParams::default()).await.unwrap();
        assert_eq!(page.total, 2);
        let titles: Vec<Option<&str>> = page.items.iter().map(|i| i.title.as_deref()).collect();
        assert!(titles.contains(&Some("Cosmos")));
        assert!(titles.contains(&Some("Stars 101")));

        assert!(!service.remove(user, tutorial).await.unwrap().bookmarked);
        assert!(!service.remove(user, tutorial).await.unwrap().bookmarked);
        assert!(matches!(
            service.add(user, ContentRef::book(404)).await,
            Err(EngagementError::ContentNotFound(_))
        ));
    }
}
