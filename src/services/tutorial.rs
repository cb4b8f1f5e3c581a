//! Tutorial service
//!
//! Video tutorials hosted on YouTube. The video id is derived from the
//! submitted URL and drives the fallback thumbnail.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{ContentFilter, NewTutorial, RatingRepository, TagRepository, TutorialRepository};
use crate::models::{
    ContentQuery, ContentRef, CreateTutorialInput, ListParams, PagedResult, RatingSummary, Tutorial,
    TutorialDetail, TutorialListItem, UpdateTutorialInput,
};
use crate::services::category::{CategoryService, CACHE_KEY_CATEGORY_LIST};
use crate::services::content::{
    detail_cache_key, ensure_category, normalize_tags, optional_text, require_text,
    resolve_category_filter, store_image, ContentServiceError, MAX_TITLE_LEN,
};
use crate::services::upload::UploadStore;
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static YOUTUBE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:youtube(?:-nocookie)?\.com/(?:watch\?(?:[^#]*&)?v=|embed/|shorts/|live/|v/)|youtu\.be/)([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
    )
    .expect("youtube url pattern is valid")
});

static YOUTUBE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("youtube id pattern is valid"));

/// Extract the 11-character video id from a YouTube URL or a bare id.
///
/// Recognises `watch?v=`, `youtu.be/`, `embed/` and `shorts/` links.
pub fn extract_youtube_id(url: &str) -> Option<String> {
    let url = url.trim();
    if YOUTUBE_ID_RE.is_match(url) {
        return Some(url.to_string());
    }
    YOUTUBE_URL_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Thumbnail URL served by YouTube for a video id
pub fn youtube_thumbnail_url(youtube_id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/hqdefault.jpg", youtube_id)
}

pub struct TutorialService {
    repo: Arc<dyn TutorialRepository>,
    tags: Arc<dyn TagRepository>,
    ratings: Arc<dyn RatingRepository>,
    categories: Arc<CategoryService>,
    uploads: Arc<UploadStore>,
    cache: Arc<Cache>,
}

impl TutorialService {
    pub fn new(
        repo: Arc<dyn TutorialRepository>,
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

    pub async fn list(&self, query: &ContentQuery) -> Result<PagedResult<TutorialListItem>, ContentServiceError> {
        let params = ListParams::from_query(query.page, query.per_page);
        let Some(category_id) = resolve_category_filter(&self.categories, query).await? else {
            return Ok(PagedResult::new(Vec::new(), 0, &params));
        };

        let filter = ContentFilter::from_query(query, category_id);
        let (items, total) = self
            .repo
            .list(&filter, &params)
            .await
            .context("Failed to list tutorials")?;
        Ok(PagedResult::new(items, total, &params))
    }

    pub async fn featured(&self, limit: u32) -> Result<Vec<TutorialListItem>, ContentServiceError> {
        let filter = ContentFilter {
            featured: Some(true),
            ..Default::default()
        };
        let (items, _) = self.repo.list(&filter, &ListParams::new(1, limit)).await?;
        Ok(items)
    }

    pub async fn get_tutorial(&self, id: i64) -> Result<Tutorial, ContentServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(ContentServiceError::NotFound(ContentRef::tutorial(id)))
    }

    pub async fn get(&self, id: i64, viewer: Option<i64>) -> Result<TutorialDetail, ContentServiceError> {
        let target = ContentRef::tutorial(id);
        let key = detail_cache_key(target);

        let mut detail = match self.cache.get::<TutorialDetail>(&key).await {
            Ok(Some(cached)) => cached,
            _ => {
                let tutorial = self.get_tutorial(id).await?;
                let category = self.categories.get_by_id(tutorial.category_id).await?;
                let tags = self.tags.list_for_content(target).await?;
                let detail = TutorialDetail {
                    tutorial,
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

        let (likes, dislikes) = self.ratings.counts(target).await?;
        let user_vote = match viewer {
            Some(user_id) => self.ratings.user_vote(user_id, target).await?,
            None => None,
        };
        detail.rating = RatingSummary::new(target, likes, dislikes, user_vote);
        Ok(detail)
    }

    pub async fn create(
        &self,
        input: CreateTutorialInput,
        created_by: Option<i64>,
    ) -> Result<TutorialDetail, ContentServiceError> {
        let tags = normalize_tags(&input.tags)?;
        let title = require_text("Title", &input.title, MAX_TITLE_LEN)?;
        let youtube_id = parse_video_url(&input.video_url)?;
        validate_duration(input.duration_seconds)?;
        ensure_category(&self.categories, input.category_id).await?;

        let new_tutorial = NewTutorial {
            title,
            description: optional_text(input.description),
            category_id: input.category_id,
            video_url: input.video_url.trim().to_string(),
            youtube_id,
            thumbnail: store_image(&self.uploads, input.thumbnail).await?,
            duration_seconds: input.duration_seconds,
            instructor: optional_text(input.instructor),
            level: input.level,
            is_featured: input.is_featured,
            created_by,
        };

        let tutorial = self
            .repo
            .create(&new_tutorial)
            .await
            .context("Failed to create tutorial")?;
        self.tags.set_for_content(ContentRef::tutorial(tutorial.id), &tags).await?;

        self.invalidate(tutorial.id).await;
        tracing::info!("Created tutorial {} '{}'", tutorial.id, tutorial.title);
        self.get(tutorial.id, None).await
    }

    pub async fn update(&self, id: i64, input: UpdateTutorialInput) -> Result<TutorialDetail, ContentServiceError> {
        let mut tutorial = self.get_tutorial(id).await?;

        if let Some(title) = input.title {
            tutorial.title = require_text("Title", &title, MAX_TITLE_LEN)?;
        }
        if let Some(video_url) = input.video_url {
            tutorial.youtube_id = parse_video_url(&video_url)?;
            tutorial.video_url = video_url.trim().to_string();
        }
        if let Some(category_id) = input.category_id {
            ensure_category(&self.categories, category_id).await?;
            tutorial.category_id = category_id;
        }
        if input.description.is_some() {
            tutorial.description = optional_text(input.description);
        }
        if input.thumbnail.is_some() {
            tutorial.thumbnail = store_image(&self.uploads, input.thumbnail).await?;
        }
        if input.instructor.is_some() {
            tutorial.instructor = optional_text(input.instructor);
        }
        if input.duration_seconds.is_some() {
            validate_duration(input.duration_seconds)?;
            tutorial.duration_seconds = input.duration_seconds;
        }
        tutorial.level = input.level.unwrap_or(tutorial.level);
        tutorial.is_featured = input.is_featured.unwrap_or(tutorial.is_featured);

        self.repo.update(&tutorial).await.context("Failed to update tutorial")?;
        if let Some(tags) = input.tags {
            let tags = normalize_tags(&tags)?;
            self.tags.set_for_content(ContentRef::tutorial(id), &tags).await?;
        }

        self.invalidate(id).await;
        self.get(id, None).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContentServiceError> {
        if !self.repo.delete(id).await? {
            return Err(ContentServiceError::NotFound(ContentRef::tutorial(id)));
        }
        self.invalidate(id).await;
        tracing::info!("Deleted tutorial {}", id);
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, ContentServiceError> {
        Ok(self.repo.count().await?)
    }

    async fn invalidate(&self, id: i64) {
        for key in [detail_cache_key(ContentRef::tutorial(id)), CACHE_KEY_CATEGORY_LIST.to_string()] {
            if let Err(e) = self.cache.delete(&key).await {
                tracing::warn!("Failed to invalidate {}: {}", key, e);
            }
        }
    }
}

fn parse_video_url(video_url: &str) -> Result<String, ContentServiceError> {
    extract_youtube_id(video_url).ok_or_else(|| {
        ContentServiceError::ValidationError(format!("Not a recognised YouTube URL: {}", video_url.trim()))
    })
}

fn validate_duration(duration: Option<i32>) -> Result<(), ContentServiceError> {
    if duration.is_some_and(|d| d < 0) {
        return Err(ContentServiceError::ValidationError("Duration cannot be negative".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use crate::db::repositories::{
        SqlxCategoryRepository, SqlxRatingRepository, SqlxTagRepository, SqlxTutorialRepository,
    };
    use crate::db::test_support::{migrated_pool, seed_category};
    use crate::models::TutorialLevel;
    use tempfile::TempDir;

    async fn setup() -> (TutorialService, i64, TempDir) {
        let pool = migrated_pool().await;
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(Cache::new());
        let categories = Arc::new(CategoryService::new(
            SqlxCategoryRepository::boxed(pool.clone()),
            cache.clone(),
        ));
        let service = TutorialService::new(
            SqlxTutorialRepository::boxed(pool.clone()),
            SqlxTagRepository::boxed(pool.clone()),
            SqlxRatingRepository::boxed(pool.clone()),
            categories,
            Arc::new(UploadStore::new(UploadConfig {
                path: dir.path().to_path_buf(),
                ..Default::default()
            })),
            cache,
        );
        let category_id = seed_category(&pool, "Programming").await;
        (service, category_id, dir)
    }

    fn input(title: &str, url: &str, category_id: i64) -> CreateTutorialInput {
        CreateTutorialInput {
            title: title.into(),
            video_url: url.into(),
            category_id,
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_youtube_id_forms() {
        let id = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(extract_youtube_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), id);
        assert_eq!(extract_youtube_id("https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42"), id);
        assert_eq!(extract_youtube_id("https://youtu.be/dQw4w9WgXcQ?si=abc"), id);
        assert_eq!(extract_youtube_id("https://www.youtube.com/embed/dQw4w9WgXcQ"), id);
        assert_eq!(extract_youtube_id("https://youtube.com/shorts/dQw4w9WgXcQ"), id);
        assert_eq!(extract_youtube_id("  dQw4w9WgXcQ "), id);
    }

    #[test]
    fn test_extract_youtube_id_rejects() {
        assert_eq!(extract_youtube_id("https://vimeo.com/123456"), None);
        assert_eq!(extract_youtube_id("https://youtu.be/short"), None);
        assert_eq!(extract_youtube_id("https://youtu.be/dQw4w9WgXcQextra"), None);
        assert_eq!(extract_youtube_id(""), None);
    }

    #[test]
    fn test_thumbnail_url() {
        assert_eq!(
            youtube_thumbnail_url("dQw4w9WgXcQ"),
            "https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        );
    }

    #[tokio::test]
    async fn test_create_derives_youtube_id() {
        let (service, category_id, _dir) = setup().await;
        let detail = service
            .create(
                CreateTutorialInput {
                    level: TutorialLevel::Advanced,
                    instructor: Some(" Jane ".into()),
                    ..input("Async Rust", "https://youtu.be/abcdefghijk", category_id)
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(detail.tutorial.youtube_id, "abcdefghijk");
        assert_eq!(detail.tutorial.level, TutorialLevel::Advanced);
        assert_eq!(detail.tutorial.instructor.as_deref(), Some("Jane"));

        let bad = service
            .create(input("Bad", "https://example.com/video", category_id), None)
            .await;
        assert!(matches!(bad, Err(ContentServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_update_and_level_filter() {
        let (service, category_id, _dir) = setup().await;
        let a = service
            .create(input("Intro", "https://youtu.be/aaaaaaaaaaa", category_id), None)
            .await
            .unwrap();
        service
            .create(
                CreateTutorialInput {
                    level: TutorialLevel::Intermediate,
                    ..input("Traits", "https://youtu.be/bbbbbbbbbbb", category_id)
                },
                None,
            )
            .await
            .unwrap();

        let updated = service
            .update(
                a.tutorial.id,
                UpdateTutorialInput {
                    video_url: Some("https://www.youtube.com/watch?v=ccccccccccc".into()),
                    level: Some(TutorialLevel::Intermediate),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.tutorial.youtube_id, "ccccccccccc");

        let intermediate = service
            .list(&ContentQuery {
                level: Some(TutorialLevel::Intermediate),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(intermediate.total, 2);

        let beginner = service
            .list(&ContentQuery {
                level: Some(TutorialLevel::Beginner),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(beginner.total, 0);

        service.delete(a.tutorial.id).await.unwrap();
        assert_eq!(service.count().await.unwrap(), 1);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn every_link_form_yields_the_id(id in "[A-Za-z0-9_-]{11}") {
                for url in [
                    format!("https://www.youtube.com/watch?v={}", id),
                    format!("https://youtu.be/{}", id),
                    format!("https://www.youtube.com/embed/{}?rel=0", id),
                    format!("https://youtube.com/shorts/{}", id),
                    id.clone(),
                ] {
                    prop_assert_eq!(extract_youtube_id(&url), Some(id.clone()));
                }
            }
        }
    }
}
