//! Blog post repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{BlogPost, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait BlogPostRepository: Send + Sync {
    async fn create(&self, post: &BlogPost) -> Result<BlogPost>;
    async fn get_by_id(&self, id: i64) -> Result<Option<BlogPost>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<BlogPost>>;
    /// One page of posts and the total matching count.
    ///
    /// Published posts are ordered by `published_at`, the full list by `created_at`.
    async fn list(&self, params: &ListParams, published_only: bool) -> Result<(Vec<BlogPost>, i64)>;
    async fn update(&self, post: &BlogPost) -> Result<BlogPost>;
    async fn delete(&self, id: i64) -> Result<()>;
    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;
}

pub struct SqlxBlogPostRepository {
    pool: DynDatabasePool,
}

impl SqlxBlogPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BlogPostRepository> {
        Arc::new(Self::new(pool))
    }
}

const COLUMNS: &str = "id, title, slug, excerpt, content, content_html, cover_image, published, \
     published_at, author_id, created_at, updated_at";

const INSERT: &str = r#"
    INSERT INTO blog_posts (title, slug, excerpt, content, content_html, cover_image, published,
                            published_at, author_id, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE: &str = r#"
    UPDATE blog_posts
    SET title = ?, slug = ?, excerpt = ?, content = ?, content_html = ?, cover_image = ?,
        published = ?, published_at = ?, updated_at = ?
    WHERE id = ?
"#;

fn list_sql(published_only: bool) -> String {
    if published_only {
        format!(
            "SELECT {} FROM blog_posts WHERE published = 1 ORDER BY published_at DESC, id DESC LIMIT ? OFFSET ?",
            COLUMNS
        )
    } else {
        format!(
            "SELECT {} FROM blog_posts ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            COLUMNS
        )
    }
}

fn count_sql(published_only: bool) -> &'static str {
    if published_only {
        "SELECT COUNT(*) as count FROM blog_posts WHERE published = 1"
    } else {
        "SELECT COUNT(*) as count FROM blog_posts"
    }
}

#[async_trait]
impl BlogPostRepository for SqlxBlogPostRepository {
    async fn create(&self, post: &BlogPost) -> Result<BlogPost> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_sqlite(pool, post).await,
            Backend::Mysql(pool) => create_mysql(pool, post).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<BlogPost>> {
        let sql = format!("SELECT {} FROM blog_posts WHERE id = ?", COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get blog post")?;
                row.map(|r| row_to_post_sqlite(&r)).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get blog post")?;
                row.map(|r| row_to_post_mysql(&r)).transpose()
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<BlogPost>> {
        let sql = format!("SELECT {} FROM blog_posts WHERE slug = ?", COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get blog post by slug")?;
                row.map(|r| row_to_post_sqlite(&r)).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get blog post by slug")?;
                row.map(|r| row_to_post_mysql(&r)).transpose()
            }
        }
    }

    async fn list(&self, params: &ListParams, published_only: bool) -> Result<(Vec<BlogPost>, i64)> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_sqlite(pool, params, published_only).await,
            Backend::Mysql(pool) => list_mysql(pool, params, published_only).await,
        }
    }

    async fn update(&self, post: &BlogPost) -> Result<BlogPost> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(UPDATE)
                    .bind(&post.title)
                    .bind(&post.slug)
                    .bind(&post.excerpt)
                    .bind(&post.content)
                    .bind(&post.content_html)
                    .bind(&post.cover_image)
                    .bind(post.published as i32)
                    .bind(post.published_at)
                    .bind(Utc::now())
                    .bind(post.id)
                    .execute(pool)
                    .await
                    .context("Failed to update blog post")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(UPDATE)
                    .bind(&post.title)
                    .bind(&post.slug)
                    .bind(&post.excerpt)
                    .bind(&post.content)
                    .bind(&post.content_html)
                    .bind(&post.cover_image)
                    .bind(post.published as i8)
                    .bind(post.published_at)
                    .bind(Utc::now())
                    .bind(post.id)
                    .execute(pool)
                    .await
                    .context("Failed to update blog post")?;
            }
        }

        self.get_by_id(post.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Blog post not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query("DELETE FROM blog_posts WHERE id = ?")
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to delete blog post")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query("DELETE FROM blog_posts WHERE id = ?")
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to delete blog post")?;
            }
        }
        Ok(())
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) as count FROM blog_posts WHERE slug = ?";
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(slug)
                .fetch_one(pool)
                .await
                .context("Failed to check blog post slug")?
                .get("count"),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(slug)
                .fetch_one(pool)
                .await
                .context("Failed to check blog post slug")?
                .get("count"),
        };
        Ok(count > 0)
    }
}

// SQLite implementations
async fn create_sqlite(pool: &SqlitePool, post: &BlogPost) -> Result<BlogPost> {
    let now = Utc::now();
    let result = sqlx::query(INSERT)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(&post.content_html)
        .bind(&post.cover_image)
        .bind(post.published as i32)
        .bind(post.published_at)
        .bind(post.author_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create blog post")?;

    Ok(BlogPost {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

async fn list_sqlite(
    pool: &SqlitePool,
    params: &ListParams,
    published_only: bool,
) -> Result<(Vec<BlogPost>, i64)> {
    let rows = sqlx::query(&list_sql(published_only))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list blog posts")?;
    let posts = rows.iter().map(row_to_post_sqlite).collect::<Result<Vec<_>>>()?;

    let total: i64 = sqlx::query(count_sql(published_only))
        .fetch_one(pool)
        .await
        .context("Failed to count blog posts")?
        .get("count");

    Ok((posts, total))
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<BlogPost> {
    Ok(BlogPost {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        cover_image: row.get("cover_image"),
        published: row.get::<i32, _>("published") != 0,
        published_at: row.get("published_at"),
        author_id: row.get("author_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// MySQL implementations
async fn create_mysql(pool: &MySqlPool, post: &BlogPost) -> Result<BlogPost> {
    let now = Utc::now();
    let result = sqlx::query(INSERT)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(&post.content_html)
        .bind(&post.cover_image)
        .bind(post.published as i8)
        .bind(post.published_at)
        .bind(post.author_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create blog post")?;

    Ok(BlogPost {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

async fn list_mysql(
    pool: &MySqlPool,
    params: &ListParams,
    published_only: bool,
) -> Result<(Vec<BlogPost>, i64)> {
    let rows = sqlx::query(&list_sql(published_only))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list blog posts")?;
    let posts = rows.iter().map(row_to_post_mysql).collect::<Result<Vec<_>>>()?;

    let total: i64 = sqlx::query(count_sql(published_only))
        .fetch_one(pool)
        .await
        .context("Failed to count blog posts")?
        .get("count");

    Ok((posts, total))
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<BlogPost> {
    Ok(BlogPost {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        cover_image: row.get("cover_image"),
        published: row.get::<i8, _>("published") != 0,
        published_at: row.get("published_at"),
        author_id: row.get("author_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations::run_migrations};
    use crate::models::{User, UserRole};
    use chrono::Duration;

    async fn setup() -> (SqlxBlogPostRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        let author = SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                "Author".to_string(),
                "author@example.com".to_string(),
                "hash".to_string(),
                UserRole::Editor,
            ))
            .await
            .expect("Failed to create author");
        (SqlxBlogPostRepository::new(pool), author.id)
    }

    fn post(slug: &str, author_id: i64, published: bool) -> BlogPost {
        BlogPost::new(
            format!("Post {}", slug),
            slug.to_string(),
            "Body".to_string(),
            "<p>Body</p>".to_string(),
            author_id,
            published,
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (repo, author_id) = setup().await;

        let created = repo.create(&post("hello", author_id, true)).await.unwrap();
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().expect("missing post");
        assert_eq!(by_id.slug, "hello");
        assert!(by_id.published);
        assert!(by_id.published_at.is_some());

        let by_slug = repo.get_by_slug("hello").await.unwrap();
        assert_eq!(by_slug.map(|p| p.id), Some(created.id));
        assert!(repo.exists_by_slug("hello").await.unwrap());
        assert!(!repo.exists_by_slug("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_filters_drafts() {
        let (repo, author_id) = setup().await;

        let mut older = post("older", author_id, true);
        older.published_at = Some(Utc::now() - Duration::days(2));
        repo.create(&older).await.unwrap();
        repo.create(&post("newer", author_id, true)).await.unwrap();
        repo.create(&post("draft", author_id, false)).await.unwrap();

        let (published, total) = repo.list(&ListParams::new(1, 10), true).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(published[0].slug, "newer");
        assert_eq!(published[1].slug, "older");

        let (all, total) = repo.list(&ListParams::new(1, 10), false).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(all.len(), 3);

        let (page2, _) = repo.list(&ListParams::new(2, 2), false).await.unwrap();
        assert_eq!(page2.len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (repo, author_id) = setup().await;
        let mut created = repo.create(&post("draft", author_id, false)).await.unwrap();

        created.title = "Renamed".to_string();
        created.published = true;
        created.published_at = Some(Utc::now());
        let updated = repo.update(&created).await.unwrap();
        assert_eq!(updated.title, "Renamed");
        assert!(updated.published);

        repo.delete(created.id).await.unwrap();
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let (repo, author_id) = setup().await;
        repo.create(&post("same", author_id, false)).await.unwrap();
        assert!(repo.create(&post("same", author_id, false)).await.is_err());
    }
}
