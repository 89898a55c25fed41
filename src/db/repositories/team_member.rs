//! Team member repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::TeamMember;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait TeamMemberRepository: Send + Sync {
    async fn create(&self, member: &TeamMember) -> Result<TeamMember>;
    async fn get_by_id(&self, id: i64) -> Result<Option<TeamMember>>;
    /// Ordered by `display_order`, then id
    async fn list(&self, active_only: bool) -> Result<Vec<TeamMember>>;
    async fn update(&self, member: &TeamMember) -> Result<TeamMember>;
    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxTeamMemberRepository {
    pool: DynDatabasePool,
}

impl SqlxTeamMemberRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TeamMemberRepository> {
        Arc::new(Self::new(pool))
    }
}

const COLUMNS: &str =
    "id, name, position, bio, photo, linkedin_url, display_order, active, created_at, updated_at";

const INSERT: &str = r#"
    INSERT INTO team_members (name, position, bio, photo, linkedin_url, display_order, active, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE: &str = r#"
    UPDATE team_members
    SET name = ?, position = ?, bio = ?, photo = ?, linkedin_url = ?, display_order = ?, active = ?, updated_at = ?
    WHERE id = ?
"#;

fn list_sql(active_only: bool) -> String {
    let filter = if active_only { " WHERE active = 1" } else { "" };
    format!(
        "SELECT {} FROM team_members{} ORDER BY display_order ASC, id ASC",
        COLUMNS, filter
    )
}

#[async_trait]
impl TeamMemberRepository for SqlxTeamMemberRepository {
    async fn create(&self, member: &TeamMember) -> Result<TeamMember> {
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(INSERT)
                .bind(&member.name)
                .bind(&member.position)
                .bind(&member.bio)
                .bind(&member.photo)
                .bind(&member.linkedin_url)
                .bind(member.display_order)
                .bind(member.active as i32)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create team member")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(INSERT)
                .bind(&member.name)
                .bind(&member.position)
                .bind(&member.bio)
                .bind(&member.photo)
                .bind(&member.linkedin_url)
                .bind(member.display_order)
                .bind(member.active as i8)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create team member")?
                .last_insert_id() as i64,
        };

        Ok(TeamMember {
            id,
            created_at: now,
            updated_at: now,
            ..member.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<TeamMember>> {
        let sql = format!("SELECT {} FROM team_members WHERE id = ?", COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get team member")?;
                Ok(row.map(|r| row_to_member_sqlite(&r)))
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get team member")?;
                Ok(row.map(|r| row_to_member_mysql(&r)))
            }
        }
    }

    async fn list(&self, active_only: bool) -> Result<Vec<TeamMember>> {
        let sql = list_sql(active_only);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list team members")?;
                Ok(rows.iter().map(row_to_member_sqlite).collect())
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list team members")?;
                Ok(rows.iter().map(row_to_member_mysql).collect())
            }
        }
    }

    async fn update(&self, member: &TeamMember) -> Result<TeamMember> {
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(UPDATE)
                    .bind(&member.name)
                    .bind(&member.position)
                    .bind(&member.bio)
                    .bind(&member.photo)
                    .bind(&member.linkedin_url)
                    .bind(member.display_order)
                    .bind(member.active as i32)
                    .bind(now)
                    .bind(member.id)
                    .execute(pool)
                    .await
                    .context("Failed to update team member")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(UPDATE)
                    .bind(&member.name)
                    .bind(&member.position)
                    .bind(&member.bio)
                    .bind(&member.photo)
                    .bind(&member.linkedin_url)
                    .bind(member.display_order)
                    .bind(member.active as i8)
                    .bind(now)
                    .bind(member.id)
                    .execute(pool)
                    .await
                    .context("Failed to update team member")?;
            }
        }

        self.get_by_id(member.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Team member not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query("DELETE FROM team_members WHERE id = ?")
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to delete team member")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query("DELETE FROM team_members WHERE id = ?")
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to delete team member")?;
            }
        }
        Ok(())
    }
}

fn row_to_member_sqlite(row: &sqlx::sqlite::SqliteRow) -> TeamMember {
    TeamMember {
        id: row.get("id"),
        name: row.get("name"),
        position: row.get("position"),
        bio: row.get("bio"),
        photo: row.get("photo"),
        linkedin_url: row.get("linkedin_url"),
        display_order: row.get("display_order"),
        active: row.get::<i32, _>("active") != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_member_mysql(row: &sqlx::mysql::MySqlRow) -> TeamMember {
    TeamMember {
        id: row.get("id"),
        name: row.get("name"),
        position: row.get("position"),
        bio: row.get("bio"),
        photo: row.get("photo"),
        linkedin_url: row.get("linkedin_url"),
        display_order: row.get("display_order"),
        active: row.get::<i8, _>("active") != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
