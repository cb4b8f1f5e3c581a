//! Reading and watching history
//!
//! One row per user and item, updated in place as the reader progresses.

use crate::db::repositories::{ContentRepository, HistoryRepository};
use crate::models::{ContentRef, HistoryEntry, HistoryItem, ListParams, PagedResult, RecordProgressInput};
use crate::services::engagement::{ensure_content_exists, EngagementError};
use std::sync::Arc;

const MAX_POSITION_LEN: usize = 255;

pub struct HistoryService {
    repo: Arc<dyn HistoryRepository>,
    content: Arc<dyn ContentRepository>,
}

impl HistoryService {
    pub fn new(repo: Arc<dyn HistoryRepository>, content: Arc<dyn ContentRepository>) -> Self {
        Self { repo, content }
    }

    /// Record progress (clamped to 0-100); reaching 100 marks the item completed
    pub async fn record(&self, user_id: i64, input: RecordProgressInput) -> Result<HistoryEntry, EngagementError> {
        let target = ContentRef::new(input.content_type, input.content_id);
        ensure_content_exists(self.content.as_ref(), target).await?;

        let progress = input.progress.clamp(0, 100);
        let position = input
            .last_position
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        if position.is_some_and(|p| p.chars().count() > MAX_POSITION_LEN) {
            return Err(EngagementError::ValidationError(format!(
                "Position cannot exceed {} characters",
                MAX_POSITION_LEN
            )));
        }

        Ok(self
            .repo
            .upsert(user_id, target, progress, position, progress >= 100)
            .await?)
    }

    pub async fn get(&self, user_id: i64, target: ContentRef) -> Result<Option<HistoryEntry>, EngagementError> {
        Ok(self.repo.get(user_id, target).await?)
    }

    pub async fn list_for_user(
        &self,
        user_id: i64,
        params: &ListParams,
    ) -> Result<PagedResult<HistoryItem>, EngagementError> {
        let (items, total) = self.repo.list_for_user(user_id, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn clear(&self, user_id: i64) -> Result<u64, EngagementError> {
        let removed = self.repo.clear(user_id).await?;
        tracing::debug!("Cleared {} history entries of user {}", removed, user_id);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxContentRepository, SqlxHistoryRepository};
    use crate::db::test_support::{migrated_pool, seed_book, seed_category, seed_tutorial, seed_user};
    use crate::models::{ContentType, UserRole};

    fn progress(target: ContentRef, progress: i32, position: Option<&str>) -> RecordProgressInput {
        RecordProgressInput {
            content_type: target.content_type,
            content_id: target.content_id,
            progress,
            last_position: position.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_record_clamps_and_completes() {
        let pool = migrated_pool().await;
        let service = HistoryService::new(
            SqlxHistoryRepository::boxed(pool.clone()),
            SqlxContentRepository::boxed(pool.clone()),
        );
        let user = seed_user(&pool, "reader", UserRole::User).await;
        let category = seed_category(&pool, "Math").await;
        let book = ContentRef::book(seed_book(&pool, category, "Calculus").await);
        let video = ContentRef::tutorial(seed_tutorial(&pool, category, "Limits").await);

        let entry = service.record(user, progress(book, -20, Some("page 1"))).await.unwrap();
        assert_eq!(entry.progress, 0);
        assert!(!entry.completed);

        let entry = service.record(user, progress(book, 250, Some("page 300"))).await.unwrap();
        assert_eq!(entry.progress, 100);
        assert!(entry.completed);
        assert_eq!(entry.last_position.as_deref(), Some("page 300"));

        // Re-reading does not un-complete
        let entry = service.record(user, progress(book, 10, None)).await.unwrap();
        assert!(entry.completed);

        service.record(user, progress(video, 40, Some("12:30"))).await.unwrap();
        let page = service.list_for_user(user, &ListParams::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].entry.content_type, ContentType::Tutorial);

        assert!(matches!(
            service.record(user, progress(ContentRef::book(999), 10, None)).await,
            Err(EngagementError::ContentNotFound(_))
        ));

        assert_eq!(service.clear(user).await.unwrap(), 2);
        assert!(service.get(user, book).await.unwrap().is_none());
    }
}
