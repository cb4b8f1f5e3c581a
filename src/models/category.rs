//! Category model
//!
//! Books and tutorials each belong to exactly one category. A category that is
//! still referenced cannot be deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Category {
    /// Unique identifier
    pub id: i64,
    /// Display name (unique)
    pub name: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    pub description: Option<String>,
    /// Icon name or image URL used by the category grid
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category with the number of items filed under it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct CategoryWithCounts {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub category: Category,
    pub book_count: i64,
    pub tutorial_count: i64,
}

/// Input for creating a new category
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    /// Generated from the name when absent
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl CreateCategoryInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: None,
            description: None,
            icon: None,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Input for updating a category; `None` keeps the current value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_input_builder() {
        let input = CreateCategoryInput::new("Science Fiction")
            .with_description("Space and beyond")
            .with_icon("rocket");

        assert_eq!(input.name, "Science Fiction");
        assert!(input.slug.is_none());
        assert_eq!(input.description.as_deref(), Some("Space and beyond"));
        assert_eq!(input.icon.as_deref(), Some("rocket"));
    }

    #[test]
    fn test_counts_serialize_flat() {
        let now = Utc::now();
        let item = CategoryWithCounts {
            category: Category {
                id: 3,
                name: "History".into(),
                slug: "history".into(),
                description: None,
                icon: None,
                created_at: now,
                updated_at: now,
            },
            book_count: 4,
            tutorial_count: 1,
        };

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["slug"], "history");
        assert_eq!(json["book_count"], 4);
        assert_eq!(json["tutorial_count"], 1);
    }
}
