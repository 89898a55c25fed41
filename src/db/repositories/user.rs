//! User repository
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::{OtpPurpose, User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email (exact match, callers pass the lowercase form)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get the user that has requested a change to the given address
    async fn get_by_pending_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist every mutable field of the user
    async fn update(&self, user: &User) -> Result<User>;

    /// Delete a user
    async fn delete(&self, id: i64) -> Result<()>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// Lowest user id, `None` for an empty table
    async fn first_user_id(&self) -> Result<Option<i64>>;

    /// List users, newest first, with the total count
    async fn list(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64)>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_verified, otp_hash, otp_purpose, \
     otp_expires_at, pending_email, pending_email_otp_hash, pending_email_otp_expires_at, \
     created_at, updated_at";

const INSERT_USER: &str = r#"
    INSERT INTO users (name, email, password_hash, role, is_verified, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_USER: &str = r#"
    UPDATE users
    SET name = ?, email = ?, password_hash = ?, role = ?, is_verified = ?,
        otp_hash = ?, otp_purpose = ?, otp_expires_at = ?,
        pending_email = ?, pending_email_otp_hash = ?, pending_email_otp_expires_at = ?,
        updated_at = ?
    WHERE id = ?
"#;

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_user_sqlite(pool, user).await,
            Backend::Mysql(pool) => create_user_mysql(pool, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_user_by_id_mysql(pool, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_by_column_sqlite(pool, "email", email).await,
            Backend::Mysql(pool) => get_user_by_column_mysql(pool, "email", email).await,
        }
    }

    async fn get_by_pending_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_by_column_sqlite(pool, "pending_email", email).await,
            Backend::Mysql(pool) => get_user_by_column_mysql(pool, "pending_email", email).await,
        }
    }

    async fn update(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_user_sqlite(pool, user).await,
            Backend::Mysql(pool) => update_user_mysql(pool, user).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query("DELETE FROM users WHERE id = ?")
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to delete user")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query("DELETE FROM users WHERE id = ?")
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to delete user")?;
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => count_users_sqlite(pool).await,
            Backend::Mysql(pool) => count_users_mysql(pool).await,
        }
    }

    async fn first_user_id(&self) -> Result<Option<i64>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query("SELECT MIN(id) as id FROM users")
                    .fetch_one(pool)
                    .await
                    .context("Failed to find first user")?;
                Ok(row.get("id"))
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query("SELECT MIN(id) as id FROM users")
                    .fetch_one(pool)
                    .await
                    .context("Failed to find first user")?;
                Ok(row.get("id"))
            }
        }
    }

    async fn list(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64)> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_users_sqlite(pool, page, per_page).await,
            Backend::Mysql(pool) => list_users_mysql(pool, page, per_page).await,
        }
    }
}

fn parse_role(role_str: &str) -> Result<UserRole> {
    UserRole::from_str(role_str).with_context(|| format!("Invalid role in database: {}", role_str))
}

fn parse_purpose(purpose: Option<String>) -> Result<Option<OtpPurpose>> {
    purpose
        .map(|p| {
            OtpPurpose::from_str(&p).with_context(|| format!("Invalid OTP purpose in database: {}", p))
        })
        .transpose()
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(INSERT_USER)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(user.is_verified as i32)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.map(|r| row_to_user_sqlite(&r)).transpose()
}

async fn get_user_by_column_sqlite(
    pool: &SqlitePool,
    column: &'static str,
    value: &str,
) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column))
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get user by {}", column))?;

    row.map(|r| row_to_user_sqlite(&r)).transpose()
}

async fn update_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    sqlx::query(UPDATE_USER)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(user.is_verified as i32)
        .bind(&user.otp_hash)
        .bind(user.otp_purpose.map(|p| p.to_string()))
        .bind(user.otp_expires_at)
        .bind(&user.pending_email)
        .bind(&user.pending_email_otp_hash)
        .bind(user.pending_email_otp_expires_at)
        .bind(Utc::now())
        .bind(user.id)
        .execute(pool)
        .await
        .context("Failed to update user")?;

    get_user_by_id_sqlite(pool, user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn count_users_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;

    Ok(row.get("count"))
}

async fn list_users_sqlite(pool: &SqlitePool, page: i64, per_page: i64) -> Result<(Vec<User>, i64)> {
    let offset = (page.max(1) - 1) * per_page;

    let rows = sqlx::query(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        USER_COLUMNS
    ))
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list users")?;

    let users = rows
        .iter()
        .map(row_to_user_sqlite)
        .collect::<Result<Vec<_>>>()?;
    let total = count_users_sqlite(pool).await?;

    Ok((users, total))
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");

    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: parse_role(&role_str)?,
        is_verified: row.get::<i32, _>("is_verified") != 0,
        otp_hash: row.get("otp_hash"),
        otp_purpose: parse_purpose(row.get("otp_purpose"))?,
        otp_expires_at: row.get("otp_expires_at"),
        pending_email: row.get("pending_email"),
        pending_email_otp_hash: row.get("pending_email_otp_hash"),
        pending_email_otp_expires_at: row.get("pending_email_otp_expires_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(INSERT_USER)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(user.is_verified as i8)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.map(|r| row_to_user_mysql(&r)).transpose()
}

async fn get_user_by_column_mysql(
    pool: &MySqlPool,
    column: &'static str,
    value: &str,
) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column))
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get user by {}", column))?;

    row.map(|r| row_to_user_mysql(&r)).transpose()
}

async fn update_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    sqlx::query(UPDATE_USER)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(user.is_verified as i8)
        .bind(&user.otp_hash)
        .bind(user.otp_purpose.map(|p| p.to_string()))
        .bind(user.otp_expires_at)
        .bind(&user.pending_email)
        .bind(&user.pending_email_otp_hash)
        .bind(user.pending_email_otp_expires_at)
        .bind(Utc::now())
        .bind(user.id)
        .execute(pool)
        .await
        .context("Failed to update user")?;

    get_user_by_id_mysql(pool, user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn count_users_mysql(pool: &MySqlPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;

    Ok(row.get("count"))
}

async fn list_users_mysql(pool: &MySqlPool, page: i64, per_page: i64) -> Result<(Vec<User>, i64)> {
    let offset = (page.max(1) - 1) * per_page;

    let rows = sqlx::query(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        USER_COLUMNS
    ))
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list users")?;

    let users = rows
        .iter()
        .map(row_to_user_mysql)
        .collect::<Result<Vec<_>>>()?;
    let total = count_users_mysql(pool).await?;

    Ok((users, total))
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let role_str: String = row.get("role");

    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: parse_role(&role_str)?,
        is_verified: row.get::<i8, _>("is_verified") != 0,
        otp_hash: row.get("otp_hash"),
        otp_purpose: parse_purpose(row.get("otp_purpose"))?,
        otp_expires_at: row.get("otp_expires_at"),
        pending_email: row.get("pending_email"),
        pending_email_otp_hash: row.get("pending_email_otp_hash"),
        pending_email_otp_expires_at: row.get("pending_email_otp_expires_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};
    use chrono::Duration;

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn test_user(email: &str, role: UserRole) -> User {
        User::new(
            "Test User".to_string(),
            email.to_string(),
            "argon2hash".to_string(),
            role,
        )
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let created = repo
            .create(&test_user("test@example.com", UserRole::Admin))
            .await
            .expect("Failed to create user");
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().expect("missing user");
        assert_eq!(by_id.email, "test@example.com");
        assert_eq!(by_id.role, UserRole::Admin);
        assert!(!by_id.is_verified);

        let by_email = repo.get_by_email("test@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(created.id));

        assert!(repo.get_by_id(999).await.unwrap().is_none());
        assert!(repo.get_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let repo = setup_test_repo().await;

        repo.create(&test_user("dup@example.com", UserRole::Member))
            .await
            .expect("Failed to create first user");
        let result = repo.create(&test_user("dup@example.com", UserRole::Member)).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_update_otp_and_pending_fields() {
        let repo = setup_test_repo().await;
        let mut user = repo
            .create(&test_user("otp@example.com", UserRole::Member))
            .await
            .unwrap();

        let expires = Utc::now() + Duration::minutes(10);
        user.otp_hash = Some("abc123".to_string());
        user.otp_purpose = Some(OtpPurpose::ResetPassword);
        user.otp_expires_at = Some(expires);
        user.pending_email = Some("new@example.com".to_string());
        user.pending_email_otp_hash = Some("def456".to_string());
        user.pending_email_otp_expires_at = Some(expires);
        user.is_verified = true;

        let updated = repo.update(&user).await.expect("Failed to update user");
        assert!(updated.is_verified);
        assert_eq!(updated.otp_hash.as_deref(), Some("abc123"));
        assert_eq!(updated.otp_purpose, Some(OtpPurpose::ResetPassword));
        assert_eq!(
            updated.otp_expires_at.map(|t| t.timestamp()),
            Some(expires.timestamp())
        );

        let pending = repo.get_by_pending_email("new@example.com").await.unwrap();
        assert_eq!(pending.map(|u| u.id), Some(user.id));

        user.clear_otp();
        user.clear_pending_email();
        let cleared = repo.update(&user).await.unwrap();
        assert!(cleared.otp_hash.is_none());
        assert!(cleared.otp_purpose.is_none());
        assert!(cleared.pending_email.is_none());
    }

    #[tokio::test]
    async fn test_delete_and_count() {
        let repo = setup_test_repo().await;
        let a = repo.create(&test_user("a@example.com", UserRole::Admin)).await.unwrap();
        repo.create(&test_user("b@example.com", UserRole::Member)).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);

        repo.delete(a.id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.get_by_id(a.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_users_paginated() {
        let repo = setup_test_repo().await;
        for i in 0..5 {
            repo.create(&test_user(&format!("user{}@example.com", i), UserRole::Member))
                .await
                .unwrap();
        }

        let (page1, total) = repo.list(1, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page1.len(), 2);

        let (page3, _) = repo.list(3, 2).await.unwrap();
        assert_eq!(page3.len(), 1);
    }
}
