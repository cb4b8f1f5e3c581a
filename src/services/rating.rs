//! Like/dislike votes
//!
//! A vote toggles: voting again with the same value removes it and voting
//! the other way switches it. Every write answers with the authoritative
//! summary so an optimistic client can reconcile.

use crate::db::repositories::{ContentRepository, RatingRepository};
use crate::models::{ContentRef, RatingSummary, VOTE_DISLIKE, VOTE_LIKE};
use crate::services::engagement::{ensure_content_exists, EngagementError};
use std::sync::Arc;

pub struct RatingService {
    repo: Arc<dyn RatingRepository>,
    content: Arc<dyn ContentRepository>,
}

impl RatingService {
    pub fn new(repo: Arc<dyn RatingRepository>, content: Arc<dyn ContentRepository>) -> Self {
        Self { repo, content }
    }

    pub async fn vote(&self, user_id: i64, target: ContentRef, vote: i32) -> Result<RatingSummary, EngagementError> {
        if vote != VOTE_LIKE && vote != VOTE_DISLIKE {
            return Err(EngagementError::InvalidVote(vote));
        }
        ensure_content_exists(self.content.as_ref(), target).await?;

        let user_vote = self.repo.apply_vote(user_id, target, vote).await?;
        tracing::debug!("User {} vote on {} is now {:?}", user_id, target, user_vote);

        let (likes, dislikes) = self.repo.counts(target).await?;
        Ok(RatingSummary::new(target, likes, dislikes, user_vote))
    }

    pub async fn summary(&self, target: ContentRef, viewer: Option<i64>) -> Result<RatingSummary, EngagementError> {
        ensure_content_exists(self.content.as_ref(), target).await?;
        let (likes, dislikes) = self.repo.counts(target).await?;
        let user_vote = match viewer {
            Some(user_id) => self.repo.user_vote(user_id, target).await?,
            None => None,
        };
        Ok(RatingSummary::new(target, likes, dislikes, user_vote))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxContentRepository, SqlxRatingRepository};
    use crate::db::test_support::{migrated_pool, seed_book, seed_category, seed_user};
    use crate::models::UserRole;

    #[tokio::test]
    async fn test_vote_toggle_switch_and_counts() {
        let pool = migrated_pool().await;
        let service = RatingService::new(
            SqlxRatingRepository::boxed(pool.clone()),
            SqlxContentRepository::boxed(pool.clone()),
        );
        let alice = seed_user(&pool, "alice", UserRole::User).await;
        let bob = seed_user(&pool, "bob", UserRole::User).await;
        let category = seed_category(&pool, "Fiction").await;
        let book = ContentRef::book(seed_book(&pool, category, "Emma").await);

        let s = service.vote(alice, book, VOTE_LIKE).await.unwrap();
        assert_eq!((s.likes, s.dislikes, s.user_vote), (1, 0, Some(VOTE_LIKE)));

        let s = service.vote(bob, book, VOTE_DISLIKE).await.unwrap();
        assert_eq!((s.likes, s.dislikes, s.score), (1, 1, 0));

        // Same vote again removes it
        let s = service.vote(alice, book, VOTE_LIKE).await.unwrap();
        assert_eq!((s.likes, s.user_vote), (0, None));

        // Opposite vote switches
        service.vote(bob, book, VOTE_LIKE).await.unwrap();
        let s = service.summary(book, Some(bob)).await.unwrap();
        assert_eq!((s.likes, s.dislikes, s.user_vote), (1, 0, Some(VOTE_LIKE)));

        let anonymous = service.summary(book, None).await.unwrap();
        assert_eq!(anonymous.user_vote, None);
    }

    #[tokio::test]
    async fn test_vote_rejects_bad_input() {
        let pool = migrated_pool().await;
        let service = RatingService::new(
            SqlxRatingRepository::boxed(pool.clone()),
            SqlxContentRepository::boxed(pool.clone()),
        );
        let user = seed_user(&pool, "carol", UserRole::User).await;
        let category = seed_category(&pool, "Fiction").await;
        let book = ContentRef::book(seed_book(&pool, category, "Emma").await);

        assert!(matches!(
            service.vote(user, book, 5).await,
            Err(EngagementError::InvalidVote(5))
        ));
        assert!(matches!(
            service.vote(user, ContentRef::tutorial(42), VOTE_LIKE).await,
            Err(EngagementError::ContentNotFound(_))
        ));
    }
}
