//! Blog post model
//!
//! This module provides:
//! - `BlogPost` entity with its markdown source and rendered HTML
//! - Input types for creating and updating posts
//! - Pagination types shared by list queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Blog post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: i64,
    pub title: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    pub excerpt: Option<String>,
    /// Markdown content
    pub content: String,
    /// Rendered HTML content
    pub content_html: String,
    pub cover_image: Option<String>,
    pub published: bool,
    /// Set on first publish and kept afterwards
    pub published_at: Option<DateTime<Utc>>,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlogPost {
    /// Create a new post with the given parameters
    pub fn new(
        title: String,
        slug: String,
        content: String,
        content_html: String,
        author_id: i64,
        published: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by database
            title,
            slug,
            excerpt: None,
            content,
            content_html,
            cover_image: None,
            published,
            published_at: published.then_some(now),
            author_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for creating a post
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBlogPostInput {
    pub title: String,
    /// Derived from the title when absent
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub published: bool,
}

impl CreateBlogPostInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn published(mut self, published: bool) -> Self {
        self.published = published;
        self
    }
}

/// Input for updating a post; absent fields are left unchanged.
///
/// For the nullable text fields an empty string clears the value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBlogPostInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub cover_image: Option<String>,
    pub published: Option<bool>,
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters, clamped to `page >= 1` and `1..=100` per page
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> PagedResult<T> {
    /// Create a new paginated result
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        let per_page = params.per_page.max(1) as i64;
        let total_pages = ((total.max(0) + per_page - 1) / per_page) as u32;
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
            total_pages,
        }
    }

    /// Check if there is a next page
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Check if there is a previous page
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_post_published_at() {
        let draft = BlogPost::new("T".into(), "t".into(), "c".into(), "<p>c</p>".into(), 1, false);
        assert!(draft.published_at.is_none());

        let live = BlogPost::new("T".into(), "t".into(), "c".into(), "<p>c</p>".into(), 1, true);
        assert!(live.published_at.is_some());
    }

    #[test]
    fn test_list_params_clamping() {
        let params = ListParams::new(0, 0);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 1);

        let params = ListParams::new(3, 500);
        assert_eq!(params.per_page, 100);
        assert_eq!(params.offset(), 200);
        assert_eq!(params.limit(), 100);
    }

    #[test]
    fn test_paged_result_pages() {
        let params = ListParams::new(2, 10);
        let result = PagedResult::new(vec![1, 2, 3], 23, &params);
        assert_eq!(result.total_pages, 3);
        assert!(result.has_next());
        assert!(result.has_prev());

        let empty: PagedResult<i32> = PagedResult::new(vec![], 0, &ListParams::default());
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next());
        assert!(!empty.has_prev());
    }

    #[test]
    fn test_create_input_deserialize_defaults() {
        let input: CreateBlogPostInput =
            serde_json::from_str(r#"{"title":"Hello","content":"World"}"#).unwrap();
        assert_eq!(input.title, "Hello");
        assert!(input.slug.is_none());
        assert!(!input.published);
    }
}
