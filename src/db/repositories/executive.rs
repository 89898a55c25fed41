//! Executive repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::Executive;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait ExecutiveRepository: Send + Sync {
    async fn create(&self, executive: &Executive) -> Result<Executive>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Executive>>;
    /// Ordered by `display_order`, then id
    async fn list(&self, active_only: bool) -> Result<Vec<Executive>>;
    async fn update(&self, executive: &Executive) -> Result<Executive>;
    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxExecutiveRepository {
    pool: DynDatabasePool,
}

impl SqlxExecutiveRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ExecutiveRepository> {
        Arc::new(Self::new(pool))
    }
}

const COLUMNS: &str =
    "id, name, title, bio, photo, display_order, active, created_at, updated_at";

const INSERT: &str = r#"
    INSERT INTO executives (name, title, bio, photo, display_order, active, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE: &str = r#"
    UPDATE executives
    SET name = ?, title = ?, bio = ?, photo = ?, display_order = ?, active = ?, updated_at = ?
    WHERE id = ?
"#;

fn list_sql(active_only: bool) -> String {
    let filter = if active_only { " WHERE active = 1" } else { "" };
    format!(
        "SELECT {} FROM executives{} ORDER BY display_order ASC, id ASC",
        COLUMNS, filter
    )
}

#[async_trait]
impl ExecutiveRepository for SqlxExecutiveRepository {
    async fn create(&self, executive: &Executive) -> Result<Executive> {
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(INSERT)
                .bind(&executive.name)
                .bind(&executive.title)
                .bind(&executive.bio)
                .bind(&executive.photo)
                .bind(executive.display_order)
                .bind(executive.active as i32)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create executive")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(INSERT)
                .bind(&executive.name)
                .bind(&executive.title)
                .bind(&executive.bio)
                .bind(&executive.photo)
                .bind(executive.display_order)
                .bind(executive.active as i8)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create executive")?
                .last_insert_id() as i64,
        };

        Ok(Executive {
            id,
            created_at: now,
            updated_at: now,
            ..executive.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Executive>> {
        let sql = format!("SELECT {} FROM executives WHERE id = ?", COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get executive")?;
                Ok(row.map(|r| row_to_executive_sqlite(&r)))
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get executive")?;
                Ok(row.map(|r| row_to_executive_mysql(&r)))
            }
        }
    }

    async fn list(&self, active_only: bool) -> Result<Vec<Executive>> {
        let sql = list_sql(active_only);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list executives")?;
                Ok(rows.iter().map(row_to_executive_sqlite).collect())
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list executives")?;
                Ok(rows.iter().map(row_to_executive_mysql).collect())
            }
        }
    }

    async fn update(&self, executive: &Executive) -> Result<Executive> {
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(UPDATE)
                    .bind(&executive.name)
                    .bind(&executive.title)
                    .bind(&executive.bio)
                    .bind(&executive.photo)
                        .bind(executive.display_order)
                    .bind(executive.active as i32)
                    .bind(now)
                    .bind(executive.id)
                    .execute(pool)
                    .await
                    .context("Failed to update executive")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(UPDATE)
                    .bind(&executive.name)
                    .bind(&executive.title)
                    .bind(&executive.bio)
                    .bind(&executive.photo)
                        .bind(executive.display_order)
                    .bind(executive.active as i8)
                    .bind(now)
                    .bind(executive.id)
                    .execute(pool)
                    .await
                    .context("Failed to update executive")?;
            }
        }

        self.get_by_id(executive.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Executive not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query("DELETE FROM executives WHERE id = ?")
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to delete executive")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query("DELETE FROM executives WHERE id = ?")
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to delete executive")?;
            }
        }
        Ok(())
    }
}

fn row_to_executive_sqlite(row: &sqlx::sqlite::SqliteRow) -> Executive {
    Executive {
        id: row.get("id"),
        name: row.get("name"),
        title: row.get("title"),
        bio: row.get("bio"),
        photo: row.get("photo"),
        display_order: row.get("display_order"),
        active: row.get::<i32, _>("active") != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_executive_mysql(row: &sqlx::mysql::MySqlRow) -> Executive {
    Executive {
        id: row.get("id"),
        name: row.get("name"),
        title: row.get("title"),
        bio: row.get("bio"),
        photo: row.get("photo"),
        display_order: row.get("display_order"),
        active: row.get::<i8, _>("active") != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
