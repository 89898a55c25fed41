//! Testimonial repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::Testimonial;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait TestimonialRepository: Send + Sync {
    async fn create(&self, testimonial: &Testimonial) -> Result<Testimonial>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Testimonial>>;
    async fn list(&self, active_only: bool) -> Result<Vec<Testimonial>>;
    async fn update(&self, testimonial: &Testimonial) -> Result<Testimonial>;
    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxTestimonialRepository {
    pool: DynDatabasePool,
}

impl SqlxTestimonialRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TestimonialRepository> {
        Arc::new(Self::new(pool))
    }
}

const COLUMNS: &str = "id, author_name, author_title, company, content, avatar, rating, \
     display_order, active, created_at, updated_at";

const INSERT: &str = r#"
    INSERT INTO testimonials (author_name, author_title, company, content, avatar, rating,
                              display_order, active, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE: &str = r#"
    UPDATE testimonials
    SET author_name = ?, author_title = ?, company = ?, content = ?, avatar = ?, rating = ?,
        display_order = ?, active = ?, updated_at = ?
    WHERE id = ?
"#;

fn list_sql(active_only: bool) -> String {
    let filter = if active_only { " WHERE active = 1" } else { "" };
    format!(
        "SELECT {} FROM testimonials{} ORDER BY display_order ASC, id ASC",
        COLUMNS, filter
    )
}

#[async_trait]
impl TestimonialRepository for SqlxTestimonialRepository {
    async fn create(&self, testimonial: &Testimonial) -> Result<Testimonial> {
        let now = Utc::now();
        let t = testimonial;
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(INSERT)
                .bind(&t.author_name)
                .bind(&t.author_title)
                .bind(&t.company)
                .bind(&t.content)
                .bind(&t.avatar)
                .bind(t.rating)
                .bind(t.display_order)
                .bind(t.active as i32)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create testimonial")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(INSERT)
                .bind(&t.author_name)
                .bind(&t.author_title)
                .bind(&t.company)
                .bind(&t.content)
                .bind(&t.avatar)
                .bind(t.rating)
                .bind(t.display_order)
                .bind(t.active as i8)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create testimonial")?
                .last_insert_id() as i64,
        };

        Ok(Testimonial {
            id,
            created_at: now,
            updated_at: now,
            ..t.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Testimonial>> {
        let sql = format!("SELECT {} FROM testimonials WHERE id = ?", COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get testimonial")?;
                Ok(row.map(|r| row_to_testimonial_sqlite(&r)))
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get testimonial")?;
                Ok(row.map(|r| row_to_testimonial_mysql(&r)))
            }
        }
    }

    async fn list(&self, active_only: bool) -> Result<Vec<Testimonial>> {
        let sql = list_sql(active_only);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list testimonials")?;
                Ok(rows.iter().map(row_to_testimonial_sqlite).collect())
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list testimonials")?;
                Ok(rows.iter().map(row_to_testimonial_mysql).collect())
            }
        }
    }

    async fn update(&self, testimonial: &Testimonial) -> Result<Testimonial> {
        let now = Utc::now();
        let t = testimonial;
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(UPDATE)
                    .bind(&t.author_name)
                    .bind(&t.author_title)
                    .bind(&t.company)
                    .bind(&t.content)
                    .bind(&t.avatar)
                    .bind(t.rating)
                    .bind(t.display_order)
                    .bind(t.active as i32)
                    .bind(now)
                    .bind(t.id)
                    .execute(pool)
                    .await
                    .context("Failed to update testimonial")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(UPDATE)
                    .bind(&t.author_name)
                    .bind(&t.author_title)
                    .bind(&t.company)
                    .bind(&t.content)
                    .bind(&t.avatar)
                    .bind(t.rating)
                    .bind(t.display_order)
                    .bind(t.active as i8)
                    .bind(now)
                    .bind(t.id)
                    .execute(pool)
                    .await
                    .context("Failed to update testimonial")?;
            }
        }

        self.get_by_id(t.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Testimonial not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query("DELETE FROM testimonials WHERE id = ?")
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to delete testimonial")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query("DELETE FROM testimonials WHERE id = ?")
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to delete testimonial")?;
            }
        }
        Ok(())
    }
}

fn row_to_testimonial_sqlite(row: &sqlx::sqlite::SqliteRow) -> Testimonial {
    Testimonial {
        id: row.get("id"),
        author_name: row.get("author_name"),
        author_title: row.get("author_title"),
        company: row.get("company"),
        content: row.get("content"),
        avatar: row.get("avatar"),
        rating: row.get("rating"),
        display_order: row.get("display_order"),
        active: row.get::<i32, _>("active") != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_testimonial_mysql(row: &sqlx::mysql::MySqlRow) -> Testimonial {
    Testimonial {
        id: row.get("id"),
        author_name: row.get("author_name"),
        author_title: row.get("author_title"),
        company: row.get("company"),
        content: row.get("content"),
        avatar: row.get("avatar"),
        rating: row.get("rating"),
        display_order: row.get("display_order"),
        active: row.get::<i8, _>("active") != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};

    async fn setup_test_repo() -> SqlxTestimonialRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxTestimonialRepository::new(pool)
    }

    fn testimonial(author: &str, rating: Option<i32>, active: bool) -> Testimonial {
        let now = Utc::now();
        Testimonial {
            id: 0,
            author_name: author.to_string(),
            author_title: Some("CTO".to_string()),
            company: Some("Initech".to_string()),
            content: "They shipped on time.".to_string(),
            avatar: None,
            rating,
            display_order: 0,
            active,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_update_rating() {
        let repo = setup_test_repo().await;

        let mut created = repo.create(&testimonial("Peter", Some(5), true)).await.unwrap();
        let fetched = repo.get_by_id(created.id).await.unwrap().expect("missing testimonial");
        assert_eq!(fetched.rating, Some(5));
        assert_eq!(fetched.company.as_deref(), Some("Initech"));

        created.rating = None;
        let updated = repo.update(&created).await.unwrap();
        assert_eq!(updated.rating, None);
    }

    #[tokio::test]
    async fn test_list_active_and_delete() {
        let repo = setup_test_repo().await;
        let shown = repo.create(&testimonial("Shown", Some(4), true)).await.unwrap();
        repo.create(&testimonial("Hidden", None, false)).await.unwrap();

        let active = repo.list(true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].author_name, "Shown");
        assert_eq!(repo.list(false).await.unwrap().len(), 2);

        repo.delete(shown.id).await.unwrap();
        assert!(repo.list(true).await.unwrap().is_empty());
    }
}
