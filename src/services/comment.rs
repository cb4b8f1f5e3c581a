//! Comment service
//!
//! Threaded comments on books and tutorials. A reply must belong to the
//! same item as its parent; deleting a comment removes its replies.

use crate::db::repositories::{CommentRepository, ContentRepository};
use crate::models::{build_comment_threads, Comment, CommentThread, ContentRef, CreateCommentInput, User};
use crate::services::engagement::{ensure_content_exists, EngagementError};
use std::sync::Arc;

const MAX_BODY_LEN: usize = 2000;

pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    content: Arc<dyn ContentRepository>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>, content: Arc<dyn ContentRepository>) -> Self {
        Self { repo, content }
    }

    /// Top-level comments oldest first, each with its nested replies
    pub async fn list_threaded(&self, target: ContentRef) -> Result<Vec<CommentThread>, EngagementError> {
        ensure_content_exists(self.content.as_ref(), target).await?;
        let comments = self.repo.list_for_content(target).await?;
        Ok(build_comment_threads(comments))
    }

    pub async fn create(
        &self,
        user: &User,
        target: ContentRef,
        input: CreateCommentInput,
    ) -> Result<Comment, EngagementError> {
        let body = validate_body(&input.body)?;
        ensure_content_exists(self.content.as_ref(), target).await?;

        if let Some(parent_id) = input.parent_id {
            let parent = self
                .repo
                .get_by_id(parent_id)
                .await?
                .ok_or(EngagementError::CommentNotFound(parent_id))?;
            if parent.content_type != target.content_type || parent.content_id != target.content_id {
                return Err(EngagementError::ValidationError(
                    "Reply must be on the same item as its parent comment".into(),
                ));
            }
        }

        let comment = self.repo.create(user.id, target, input.parent_id, &body).await?;
        tracing::debug!("{} commented on {}", user.username, target);
        Ok(comment)
    }

    /// Edit a comment; only its author may
    pub async fn update(&self, user: &User, id: i64, body: &str) -> Result<Comment, EngagementError> {
        let body = validate_body(body)?;
        let comment = self.get(id).await?;
        if comment.user_id != user.id {
            return Err(EngagementError::Forbidden("Only the author can edit a comment".into()));
        }
        Ok(self.repo.update_body(id, &body).await?)
    }

    /// Delete a comment and its replies; the author or an admin may
    pub async fn delete(&self, user: &User, id: i64) -> Result<(), EngagementError> {
        let comment = self.get(id).await?;
        if comment.user_id != user.id && !user.is_admin() {
            return Err(EngagementError::Forbidden("Only the author or an admin can delete a comment".into()));
        }
        self.repo.delete(id).await?;
        tracing::debug!("{} deleted comment {}", user.username, id);
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, EngagementError> {
        Ok(self.repo.count().await?)
    }

    async fn get(&self, id: i64) -> Result<Comment, EngagementError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(EngagementError::CommentNotFound(id))
    }
}

fn validate_body(body: &str) -> Result<String, EngagementError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(EngagementError::ValidationError("Comment cannot be empty".into()));
    }
    if body.chars().count() > MAX_BODY_LEN {
        return Err(EngagementError::ValidationError(format!(
            "Comment cannot exceed {} characters",
            MAX_BODY_LEN
        )));
    }
    Ok(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCommentRepository, SqlxContentRepository, SqlxUserRepository, UserRepository};
    use crate::db::test_support::{migrated_pool, seed_book, seed_category, seed_user};
    use crate::db::DynDatabasePool;
    use crate::models::UserRole;

    async fn user(pool: &DynDatabasePool, name: &str, role: UserRole) -> User {
        let id = seed_user(pool, name, role).await;
        SqlxUserRepository::new(pool.clone()).get_by_id(id).await.unwrap().unwrap()
    }

    fn input(body: &str, parent_id: Option<i64>) -> CreateCommentInput {
        CreateCommentInput {
            body: body.into(),
            parent_id,
        }
    }

    async fn setup() -> (DynDatabasePool, CommentService, ContentRef, ContentRef) {
        let pool = migrated_pool().await;
        let service = CommentService::new(
            SqlxCommentRepository::boxed(pool.clone()),
            SqlxContentRepository::boxed(pool.clone()),
        );
        let category = seed_category(&pool, "Essays").await;
        let a = ContentRef::book(seed_book(&pool, category, "Walden").await);
        let b = ContentRef::book(seed_book(&pool, category, "Nature").await);
        (pool, service, a, b)
    }

    #[tokio::test]
    async fn test_threads_and_reply_rules() {
        let (pool, service, walden, nature) = setup().await;
        let reader = user(&pool, "reader", UserRole::User).await;

        let root = service.create(&reader, walden, input("  Loved it ", None)).await.unwrap();
        assert_eq!(root.body, "Loved it");
        service.create(&reader, walden, input("Me too", Some(root.id))).await.unwrap();

        let cross = service.create(&reader, nature, input("Wrong item", Some(root.id))).await;
        assert!(matches!(cross, Err(EngagementError::ValidationError(_))));
        let missing = service.create(&reader, walden, input("No parent", Some(999))).await;
        assert!(matches!(missing, Err(EngagementError::CommentNotFound(999))));

        let threads = service.list_threaded(walden).await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].count(), 2);
        assert_eq!(threads[0].comment.username, "reader");
    }

    #[tokio::test]
    async fn test_body_limits() {
        let (pool, service, walden, _) = setup().await;
        let reader = user(&pool, "reader", UserRole::User).await;

        assert!(service.create(&reader, walden, input("   ", None)).await.is_err());
        assert!(service.create(&reader, walden, input(&"x".repeat(2001), None)).await.is_err());
        assert!(service.create(&reader, walden, input(&"x".repeat(2000), None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_edit_and_delete_permissions() {
        let (pool, service, walden, _) = setup().await;
        let author = user(&pool, "author", UserRole::User).await;
        let other = user(&pool, "other", UserRole::Editor).await;
        let admin = user(&pool, "admin", UserRole::Admin).await;

        let root = service.create(&author, walden, input("First", None)).await.unwrap();
        service.create(&other, walden, input("Reply", Some(root.id))).await.unwrap();

        assert!(matches!(
            service.update(&other, root.id, "hijack").await,
            Err(EngagementError::Forbidden(_))
        ));
        let edited = service.update(&author, root.id, "First, edited").await.unwrap();
        assert_eq!(edited.body, "First, edited");

        assert!(matches!(
            service.delete(&other, root.id).await,
            Err(EngagementError::Forbidden(_))
        ));
        service.delete(&admin, root.id).await.unwrap();

        assert!(service.list_threaded(walden).await.unwrap().is_empty());
        assert_eq!(service.count().await.unwrap(), 0);
    }
}
