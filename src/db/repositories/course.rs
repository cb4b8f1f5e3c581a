//! Course and certificate repository

use crate::db::{dispatch, DynDatabasePool, InsertedId};
use crate::models::{Certificate, CertificateView, ContentRef, Course, CourseItem, CourseSummary, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Columns of a new course row
#[derive(Debug, Clone)]
pub struct NewCourse<'a> {
    pub title: &'a str,
    pub slug: &'a str,
    pub description: Option<&'a str>,
    pub category_id: Option<i64>,
    pub created_by: Option<i64>,
}

const CERTIFICATE_VIEW_SQL: &str = "\
    SELECT cert.*, co.title AS course_title, u.username, u.full_name \
    FROM certificates cert \
    JOIN courses co ON co.id = cert.course_id \
    JOIN users u ON u.id = cert.user_id";

/// Course repository trait
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Insert a course and its items (in the given order) atomically
    async fn create(&self, course: &NewCourse<'_>, items: &[ContentRef]) -> Result<Course>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Course>>;

    /// Courses with item counts, newest first
    async fn list(&self, params: &ListParams) -> Result<(Vec<CourseSummary>, i64)>;

    /// Items of a course in position order, with content titles
    async fn items(&self, course_id: i64) -> Result<Vec<CourseItem>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn get_certificate(&self, user_id: i64, course_id: i64) -> Result<Option<Certificate>>;

    async fn create_certificate(&self, user_id: i64, course_id: i64, code: &str) -> Result<Certificate>;

    async fn list_certificates(&self, user_id: i64) -> Result<Vec<CertificateView>>;

    async fn find_certificate(&self, code: &str) -> Result<Option<CertificateView>>;
}

/// SQLx-based course repository implementation
pub struct SqlxCourseRepository {
    pool: DynDatabasePool,
}

impl SqlxCourseRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CourseRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CourseRepository for SqlxCourseRepository {
    async fn create(&self, course: &NewCourse<'_>, items: &[ContentRef]) -> Result<Course> {
        let now = Utc::now();
        let id = dispatch!(self.pool, db => {
            let mut tx = db.begin().await.context("Failed to begin transaction")?;
            let id = sqlx::query(
                "INSERT INTO courses (title, slug, description, category_id, created_by, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(course.title)
            .bind(course.slug)
            .bind(course.description)
            .bind(course.category_id)
            .bind(course.created_by)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to create course")?
            .inserted_id();

            for (position, item) in items.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO course_items (course_id, content_type, content_id, position) VALUES (?, ?, ?, ?)",
                )
                .bind(id)
                .bind(item.content_type.as_str())
                .bind(item.content_id)
                .bind(position as i32 + 1)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to add {} to course", item))?;
            }

            tx.commit().await.context("Failed to commit course")?;
            id
        });

        self.get_by_id(id).await?.context("Course not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>> {
        let course = dispatch!(self.pool, db => {
            sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
                .bind(id)
                .fetch_optional(db)
                .await
                .context("Failed to get course")?
        });
        Ok(course)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Course>> {
        let course = dispatch!(self.pool, db => {
            sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE slug = ?")
                .bind(slug)
                .fetch_optional(db)
                .await
                .context("Failed to get course by slug")?
        });
        Ok(course)
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<CourseSummary>, i64)> {
        let (items, total): (Vec<CourseSummary>, i64) = dispatch!(self.pool, db => {
            let total = sqlx::query_scalar("SELECT COUNT(*) FROM courses")
                .fetch_one(db)
                .await
                .context("Failed to count courses")?;
            let items = sqlx::query_as::<_, CourseSummary>(
                "SELECT co.*, (SELECT COUNT(*) FROM course_items ci WHERE ci.course_id = co.id) AS item_count \
                 FROM courses co ORDER BY co.created_at DESC, co.id DESC LIMIT ? OFFSET ?",
            )
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(db)
            .await
            .context("Failed to list courses")?;
            (items, total)
        });
        Ok((items, total))
    }

    async fn items(&self, course_id: i64) -> Result<Vec<CourseItem>> {
        let items = dispatch!(self.pool, db => {
            sqlx::query_as::<_, CourseItem>(
                "SELECT ci.id, ci.course_id, ci.content_type, ci.content_id, ci.position, \
                        COALESCE(b.title, t.title) AS title \
                 FROM course_items ci \
                 LEFT JOIN books b ON ci.content_type = 'book' AND b.id = ci.content_id \
                 LEFT JOIN tutorials t ON ci.content_type = 'tutorial' AND t.id = ci.content_id \
                 WHERE ci.course_id = ? ORDER BY ci.position",
            )
            .bind(course_id)
            .fetch_all(db)
            .await
            .context("Failed to list course items")?
        });
        Ok(items)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = dispatch!(self.pool, db => {
            sqlx::query("DELETE FROM courses WHERE id = ?")
                .bind(id)
                .execute(db)
                .await
                .context("Failed to delete course")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn get_certificate(&self, user_id: i64, course_id: i64) -> Result<Option<Certificate>> {
        let certificate = dispatch!(self.pool, db => {
            sqlx::query_as::<_, Certificate>("SELECT * FROM certificates WHERE user_id = ? AND course_id = ?")
                .bind(user_id)
                .bind(course_id)
                .fetch_optional(db)
                .await
                .context("Failed to get certificate")?
        });
        Ok(certificate)
    }

    async fn create_certificate(&self, user_id: i64, course_id: i64, code: &str) -> Result<Certificate> {
        dispatch!(self.pool, db => {
            sqlx::query(
                "INSERT INTO certificates (user_id, course_id, certificate_code, issued_at) VALUES (?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(course_id)
            .bind(code)
            .bind(Utc::now())
            .execute(db)
            .await
            .context("Failed to issue certificate")?;
        });

        self.get_certificate(user_id, course_id)
            .await?
            .context("Certificate not found after insert")
    }

    async fn list_certificates(&self, user_id: i64) -> Result<Vec<CertificateView>> {
        let sql = format!("{} WHERE cert.user_id = ? ORDER BY cert.issued_at DESC", CERTIFICATE_VIEW_SQL);
        let certificates = dispatch!(self.pool, db => {
            sqlx::query_as::<_, CertificateView>(&sql)
                .bind(user_id)
                .fetch_all(db)
                .await
                .context("Failed to list certificates")?
        });
        Ok(certificates)
    }

    async fn find_certificate(&self, code: &str) -> Result<Option<CertificateView>> {
        let sql = format!("{} WHERE cert.certificate_code = ?", CERTIFICATE_VIEW_SQL);
        let certificate = dispatch!(self.pool, db => {
            sqlx::query_as::<_, CertificateView>(&sql)
                .bind(code)
                .fetch_optional(db)
                .await
                .context("Failed to verify certificate")?
        });
        Ok(certificate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::is_unique_violation;
    use crate::db::test_support::{migrated_pool, seed_book, seed_category, seed_tutorial, seed_user};
    use crate::models::UserRole;

    fn new_course<'a>(title: &'a str, slug: &'a str) -> NewCourse<'a> {
        NewCourse {
            title,
            slug,
            description: None,
            category_id: None,
            created_by: None,
        }
    }

    #[tokio::test]
    async fn test_create_with_ordered_items() {
        let pool = migrated_pool().await;
        let category = seed_category(&pool, "Science").await;
        let book = ContentRef::book(seed_book(&pool, category, "Cosmos").await);
        let tutorial = ContentRef::tutorial(seed_tutorial(&pool, category, "Orbits").await);
        let repo = SqlxCourseRepository::new(pool);

        let course = repo
            .create(&new_course("Astronomy", "astronomy"), &[tutorial, book])
            .await
            .unwrap();

        let items = repo.items(course.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].target(), tutorial);
        assert_eq!(items[0].position, 1);
        assert_eq!(items[1].title.as_deref(), Some("Cosmos"));

        let (list, total) = repo.list(&ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(list[0].item_count, 2);
        assert!(repo.get_by_slug("astronomy").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_item_rolls_back_course() {
        let pool = migrated_pool().await;
        let category = seed_category(&pool, "Science").await;
        let book = ContentRef::book(seed_book(&pool, category, "Cosmos").await);
        let repo = SqlxCourseRepository::new(pool);

        let err = repo
            .create(&new_course("Twice", "twice"), &[book, book])
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(repo.get_by_slug("twice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_certificates() {
        let pool = migrated_pool().await;
        let user = seed_user(&pool, "graduate", UserRole::User).await;
        let repo = SqlxCourseRepository::new(pool);
        let course = repo.create(&new_course("Intro", "intro"), &[]).await.unwrap();

        let cert = repo.create_certificate(user, course.id, "IYKE-ABC123").await.unwrap();
        assert_eq!(cert.certificate_code, "IYKE-ABC123");
        assert!(repo.create_certificate(user, course.id, "IYKE-OTHER").await.is_err());

        let view = repo.find_certificate("IYKE-ABC123").await.unwrap().unwrap();
        assert_eq!(view.course_title, "Intro");
        assert_eq!(view.username, "graduate");
        assert_eq!(repo.list_certificates(user).await.unwrap().len(), 1);
        assert!(repo.find_certificate("nope").await.unwrap().is_none());

        assert!(repo.delete(course.id).await.unwrap());
        assert!(repo.list_certificates(user).await.unwrap().is_empty());
    }
}
