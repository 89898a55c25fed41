//! Blog service
//!
//! Business logic for blog posts:
//! - Slugs derived from the title when absent, always unique
//! - Markdown rendered to `content_html` on every content change
//! - `published_at` stamped on the first publish
//! - A relay event after each mutation

use crate::db::repositories::BlogPostRepository;
use crate::models::{BlogPost, CreateBlogPostInput, ListParams, PagedResult, UpdateBlogPostInput};
use crate::relay::{Action, EventRelay, Resource};
use crate::services::content::{merge_optional, merge_required, normalize_optional, ContentError, FieldErrors};
use crate::services::markdown::MarkdownRenderer;
use crate::services::slug::generate_slug;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const MAX_TITLE_LEN: usize = 200;
const MAX_EXCERPT_LEN: usize = 500;
/// Length of the excerpt derived from the body when none is given
const AUTO_EXCERPT_LEN: usize = 200;
const FALLBACK_SLUG: &str = "post";

pub struct BlogService {
    repo: Arc<dyn BlogPostRepository>,
    renderer: MarkdownRenderer,
    relay: EventRelay,
}

impl BlogService {
    pub fn new(repo: Arc<dyn BlogPostRepository>, relay: EventRelay) -> Self {
        Self {
            repo,
            renderer: MarkdownRenderer::new(),
            relay,
        }
    }

    /// Create a post authored by `author_id`
    ///
    /// # Errors
    ///
    /// - `Validation` for a missing title or content, or a bad cover image link
    /// - `Conflict` if an explicit slug is already taken
    pub async fn create(
        &self,
        author_id: i64,
        input: CreateBlogPostInput,
    ) -> Result<BlogPost, ContentError> {
        let mut errors = FieldErrors::new();
        errors.required("title", &input.title, MAX_TITLE_LEN);
        errors.required("content", &input.content, usize::MAX);
        if let Some(ref excerpt) = input.excerpt {
            errors.max_len("excerpt", excerpt, MAX_EXCERPT_LEN);
        }
        errors.url("cover_image", input.cover_image.as_deref());
        let explicit_slug = match normalize_optional(input.slug) {
            Some(raw) => {
                let slug = generate_slug(&raw);
                if slug.is_empty() {
                    errors.push("slug must contain letters or digits");
                }
                Some(slug)
            }
            None => None,
        };
        errors.into_result()?;

        let title = input.title.trim().to_string();
        let slug = match explicit_slug {
            Some(slug) => {
                if self.slug_taken(&slug, None).await? {
                    return Err(ContentError::Conflict(format!(
                        "Slug '{}' is already in use",
                        slug
                    )));
                }
                slug
            }
            None => self.unique_slug_for(&title).await?,
        };

        let content_html = self.renderer.render(&input.content);
        let mut post = BlogPost::new(
            title,
            slug,
            input.content,
            content_html,
            author_id,
            input.published,
        );
        post.excerpt = normalize_optional(input.excerpt)
            .or_else(|| self.derive_excerpt(&post.content));
        post.cover_image = normalize_optional(input.cover_image);

        let created = self.repo.create(&post).await.context("Failed to create post")?;
        tracing::info!(id = created.id, slug = %created.slug, "Blog post created");
        self.relay.emit(Resource::Blog, Action::Created, created.id);
        Ok(created)
    }

    /// Apply a partial update
    pub async fn update(
        &self,
        id: i64,
        input: UpdateBlogPostInput,
    ) -> Result<BlogPost, ContentError> {
        let mut post = self.get_by_id(id).await?;

        let mut errors = FieldErrors::new();
        if let Some(ref title) = input.title {
            errors.required("title", title, MAX_TITLE_LEN);
        }
        if let Some(ref content) = input.content {
            errors.required("content", content, usize::MAX);
        }
        if let Some(ref excerpt) = input.excerpt {
            errors.max_len("excerpt", excerpt, MAX_EXCERPT_LEN);
        }
        errors.url("cover_image", input.cover_image.as_deref());
        let new_slug = match input.slug {
            Some(ref raw) => {
                let slug = generate_slug(raw);
                if slug.is_empty() {
                    errors.push("slug must contain letters or digits");
                }
                Some(slug)
            }
            None => None,
        };
        errors.into_result()?;

        if let Some(slug) = new_slug {
            if slug != post.slug {
                if self.slug_taken(&slug, Some(id)).await? {
                    return Err(ContentError::Conflict(format!(
                        "Slug '{}' is already in use",
                        slug
                    )));
                }
                post.slug = slug;
            }
        }

        merge_required(&mut post.title, input.title);
        // A derived excerpt follows the body; a hand-written one is left alone
        let excerpt_was_derived = post.excerpt == self.derive_excerpt(&post.content);
        if let Some(content) = input.content {
            post.content_html = self.renderer.render(&content);
            post.content = content;
        }
        merge_optional(&mut post.excerpt, input.excerpt.clone());
        if post.excerpt.is_none() || (input.excerpt.is_none() && excerpt_was_derived) {
            post.excerpt = self.derive_excerpt(&post.content);
        }
        merge_optional(&mut post.cover_image, input.cover_image);

        if let Some(published) = input.published {
            post.published = published;
            if published && post.published_at.is_none() {
                post.published_at = Some(Utc::now());
            }
        }

        let updated = self.repo.update(&post).await.context("Failed to update post")?;
        tracing::info!(id, "Blog post updated");
        self.relay.emit(Resource::Blog, Action::Updated, id);
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContentError> {
        let post = self.get_by_id(id).await?;
        self.repo.delete(post.id).await.context("Failed to delete post")?;
        tracing::info!(id, slug = %post.slug, "Blog post deleted");
        self.relay.emit(Resource::Blog, Action::Deleted, id);
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<BlogPost, ContentError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or_else(|| ContentError::NotFound("Blog post".to_string()))
    }

    /// Drafts are reported as not found
    pub async fn get_published_by_slug(&self, slug: &str) -> Result<BlogPost, ContentError> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get post by slug")?
            .filter(|post| post.published)
            .ok_or_else(|| ContentError::NotFound("Blog post".to_string()))
    }

    pub async fn list_published(
        &self,
        params: &ListParams,
    ) -> Result<PagedResult<BlogPost>, ContentError> {
        let (items, total) = self
            .repo
            .list(params, true)
            .await
            .context("Failed to list published posts")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Every post, drafts included
    pub async fn list_all(&self, params: &ListParams) -> Result<PagedResult<BlogPost>, ContentError> {
        let (items, total) = self
            .repo
            .list(params, false)
            .await
            .context("Failed to list posts")?;
        Ok(PagedResult::new(items, total, params))
    }

    async fn slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool, ContentError> {
        let existing = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to check slug uniqueness")?;
        Ok(matches!(existing, Some(post) if Some(post.id) != except_id))
    }

    /// Slug from the title, suffixed `-2`, `-3`, ... until free
    async fn unique_slug_for(&self, title: &str) -> Result<String, ContentError> {
        let base = match generate_slug(title) {
            slug if slug.is_empty() => FALLBACK_SLUG.to_string(),
            slug => slug,
        };

        let mut candidate = base.clone();
        let mut n = 2;
        while self
            .repo
            .exists_by_slug(&candidate)
            .await
            .context("Failed to check slug uniqueness")?
        {
            candidate = format!("{}-{}", base, n);
            n += 1;
        }
        Ok(candidate)
    }

    fn derive_excerpt(&self, content: &str) -> Option<String> {
        Some(self.renderer.excerpt(content, AUTO_EXCERPT_LEN)).filter(|e| !e.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxBlogPostRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations::run_migrations};
    use crate::models::{User, UserRole};

    async fn setup() -> (BlogService, EventRelay, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let author = users
            .create(&User::new(
                "Author".to_string(),
                "author@example.com".to_string(),
                "hash".to_string(),
                UserRole::Editor,
            ))
            .await
            .unwrap();

        let relay = EventRelay::new();
        let service = BlogService::new(SqlxBlogPostRepository::boxed(pool), relay.clone());
        (service, relay, author.id)
    }

    #[tokio::test]
    async fn test_create_renders_and_derives_slug() {
        let (service, relay, author) = setup().await;
        let mut events = relay.subscribe();

        let post = service
            .create(author, CreateBlogPostInput::new("Hello, World!", "Some **bold** news."))
            .await
            .unwrap();

        assert_eq!(post.slug, "hello-world");
        assert!(post.content_html.contains("<strong>bold</strong>"));
        assert_eq!(post.excerpt.as_deref(), Some("Some bold news."));
        assert!(!post.published);
        assert!(post.published_at.is_none());
        assert_eq!(events.recv().await.unwrap().event, "blog:created");
    }

    #[tokio::test]
    async fn test_derived_excerpt_follows_content() {
        let (service, _, author) = setup().await;
        let post = service
            .create(author, CreateBlogPostInput::new("Notes", "First draft."))
            .await
            .unwrap();
        assert_eq!(post.excerpt.as_deref(), Some("First draft."));

        let post = service
            .update(
                post.id,
                UpdateBlogPostInput {
                    content: Some("Second draft.".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(post.excerpt.as_deref(), Some("Second draft."));
    }

    #[tokio::test]
    async fn test_written_excerpt_survives_content_edit() {
        let (service, _, author) = setup().await;
        let mut input = CreateBlogPostInput::new("Notes", "First draft.");
        input.excerpt = Some("A summary by hand".to_string());
        let post = service.create(author, input).await.unwrap();

        let post = service
            .update(
                post.id,
                UpdateBlogPostInput {
                    content: Some("Completely different body.".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(post.excerpt.as_deref(), Some("A summary by hand"));

        // Clearing it falls back to the derived one
        let post = service
            .update(
                post.id,
                UpdateBlogPostInput {
                    excerpt: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(post.excerpt.as_deref(), Some("Completely different body."));
    }

    #[tokio::test]
    async fn test_duplicate_titles_get_suffixed_slugs() {
        let (service, _, author) = setup().await;

        let a = service.create(author, CreateBlogPostInput::new("Launch", "a")).await.unwrap();
        let b = service.create(author, CreateBlogPostInput::new("Launch", "b")).await.unwrap();
        let c = service.create(author, CreateBlogPostInput::new("Launch", "c")).await.unwrap();

        assert_eq!(a.slug, "launch");
        assert_eq!(b.slug, "launch-2");
        assert_eq!(c.slug, "launch-3");
    }

    #[tokio::test]
    async fn test_explicit_slug_conflict() {
        let (service, _, author) = setup().await;
        service
            .create(author, CreateBlogPostInput::new("One", "x").with_slug("taken"))
            .await
            .unwrap();

        let result = service
            .create(author, CreateBlogPostInput::new("Two", "y").with_slug("Taken"))
            .await;
        assert!(matches!(result, Err(ContentError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_validation_reports_every_field() {
        let (service, _, author) = setup().await;
        let mut input = CreateBlogPostInput::new(" ", "");
        input.cover_image = Some("javascript:alert(1)".to_string());

        match service.create(author, input).await {
            Err(ContentError::Validation(messages)) => assert_eq!(messages.len(), 3),
            other => panic!("expected validation error, got {:?}", other.map(|p| p.id)),
        }
    }

    #[tokio::test]
    async fn test_raw_html_is_escaped_in_rendered_content() {
        let (service, _, author) = setup().await;
        let post = service
            .create(author, CreateBlogPostInput::new("XSS", "<script>alert(1)</script>"))
            .await
            .unwrap();
        assert!(!post.content_html.contains("<script>"));
    }

    #[tokio::test]
    async fn test_publish_sets_published_at_once() {
        let (service, _, author) = setup().await;
        let post = service.create(author, CreateBlogPostInput::new("Draft", "x")).await.unwrap();

        let published = service
            .update(post.id, UpdateBlogPostInput { published: Some(true), ..Default::default() })
            .await
            .unwrap();
        let first_published_at = published.published_at.expect("published_at should be set");

        service
            .update(post.id, UpdateBlogPostInput { published: Some(false), ..Default::default() })
            .await
            .unwrap();
        let again = service
            .update(post.id, UpdateBlogPostInput { published: Some(true), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(again.published_at, Some(first_published_at));
    }

    #[tokio::test]
    async fn test_update_partial_fields() {
        let (service, relay, author) = setup().await;
        let mut input = CreateBlogPostInput::new("Title", "Body").with_slug("title");
        input.cover_image = Some("/uploads/blog/a.png".to_string());
        let post = service.create(author, input).await.unwrap();
        let mut events = relay.subscribe();

        let updated = service
            .update(
                post.id,
                UpdateBlogPostInput {
                    content: Some("# New".to_string()),
                    cover_image: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Title");
        assert_eq!(updated.slug, "title");
        assert!(updated.content_html.contains("<h1>New</h1>"));
        assert!(updated.cover_image.is_none());
        assert_eq!(events.recv().await.unwrap().event, "blog:updated");
    }

    #[tokio::test]
    async fn test_update_slug_conflict_and_self() {
        let (service, _, author) = setup().await;
        let a = service.create(author, CreateBlogPostInput::new("A", "a")).await.unwrap();
        service.create(author, CreateBlogPostInput::new("B", "b")).await.unwrap();

        let same = service
            .update(a.id, UpdateBlogPostInput { slug: Some("a".to_string()), ..Default::default() })
            .await;
        assert!(same.is_ok());

        let clash = service
            .update(a.id, UpdateBlogPostInput { slug: Some("b".to_string()), ..Default::default() })
            .await;
        assert!(matches!(clash, Err(ContentError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_published_listing_and_slug_lookup() {
        let (service, _, author) = setup().await;
        service
            .create(author, CreateBlogPostInput::new("Live", "x").published(true))
            .await
            .unwrap();
        service.create(author, CreateBlogPostInput::new("Draft", "y")).await.unwrap();

        let published = service.list_published(&ListParams::default()).await.unwrap();
        assert_eq!(published.total, 1);
        assert_eq!(published.items[0].slug, "live");

        let all = service.list_all(&ListParams::default()).await.unwrap();
        assert_eq!(all.total, 2);

        assert!(service.get_published_by_slug("live").await.is_ok());
        assert!(matches!(
            service.get_published_by_slug("draft").await,
            Err(ContentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let (service, relay, author) = setup().await;
        let post = service.create(author, CreateBlogPostInput::new("Gone", "x")).await.unwrap();
        let mut events = relay.subscribe();

        service.delete(post.id).await.unwrap();
        assert_eq!(events.recv().await.unwrap().event, "blog:deleted");
        assert!(matches!(service.get_by_id(post.id).await, Err(ContentError::NotFound(_))));
        assert!(matches!(service.delete(post.id).await, Err(ContentError::NotFound(_))));
    }
}
