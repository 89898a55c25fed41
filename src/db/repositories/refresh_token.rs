//! Refresh token repository
//!
//! Database operations for refresh token records. Tokens are looked up by
//! their SHA-256 digest only.

use crate::db::{Backend, DynDatabasePool};
use crate::models::RefreshToken;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn create(&self, token: &RefreshToken) -> Result<RefreshToken>;

    async fn get_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>>;

    /// Mark a single token revoked. Returns false if it was already revoked or absent.
    async fn revoke(&self, id: i64) -> Result<bool>;

    /// Revoke every active token of a user, returning how many were revoked
    async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64>;

    /// Remove tokens that expired before now
    async fn delete_expired(&self) -> Result<u64>;
}

pub struct SqlxRefreshTokenRepository {
    pool: DynDatabasePool,
}

impl SqlxRefreshTokenRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn RefreshTokenRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_TOKEN: &str =
    "INSERT INTO refresh_tokens (user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?)";
const SELECT_BY_HASH: &str = "SELECT id, user_id, token_hash, expires_at, revoked_at, created_at \
     FROM refresh_tokens WHERE token_hash = ?";
const REVOKE_ONE: &str =
    "UPDATE refresh_tokens SET revoked_at = ? WHERE id = ? AND revoked_at IS NULL";
const REVOKE_ALL: &str =
    "UPDATE refresh_tokens SET revoked_at = ? WHERE user_id = ? AND revoked_at IS NULL";
const DELETE_EXPIRED: &str = "DELETE FROM refresh_tokens WHERE expires_at < ?";

#[async_trait]
impl RefreshTokenRepository for SqlxRefreshTokenRepository {
    async fn create(&self, token: &RefreshToken) -> Result<RefreshToken> {
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => create_sqlite(pool, token, now).await?,
            Backend::Mysql(pool) => create_mysql(pool, token, now).await?,
        };

        Ok(RefreshToken {
            id,
            created_at: now,
            ..token.clone()
        })
    }

    async fn get_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_by_hash_sqlite(pool, token_hash).await,
            Backend::Mysql(pool) => get_by_hash_mysql(pool, token_hash).await,
        }
    }

    async fn revoke(&self, id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(REVOKE_ONE)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to revoke refresh token")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(REVOKE_ONE)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to revoke refresh token")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64> {
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(REVOKE_ALL)
                .bind(now)
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to revoke user refresh tokens")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(REVOKE_ALL)
                .bind(now)
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to revoke user refresh tokens")?
                .rows_affected(),
        };
        Ok(affected)
    }

    async fn delete_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(DELETE_EXPIRED)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to delete expired refresh tokens")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(DELETE_EXPIRED)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to delete expired refresh tokens")?
                .rows_affected(),
        };
        Ok(affected)
    }
}

// SQLite implementations
async fn create_sqlite(
    pool: &SqlitePool,
    token: &RefreshToken,
    now: chrono::DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(INSERT_TOKEN)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create refresh token")?;
    Ok(result.last_insert_rowid())
}

async fn get_by_hash_sqlite(pool: &SqlitePool, token_hash: &str) -> Result<Option<RefreshToken>> {
    let row = sqlx::query(SELECT_BY_HASH)
        .bind(token_hash)
        .fetch_optional(pool)
        .await
        .context("Failed to get refresh token")?;

    Ok(row.map(|r| RefreshToken {
        id: r.get("id"),
        user_id: r.get("user_id"),
        token_hash: r.get("token_hash"),
        expires_at: r.get("expires_at"),
        revoked_at: r.get("revoked_at"),
        created_at: r.get("created_at"),
    }))
}

// MySQL implementations
async fn create_mysql(
    pool: &MySqlPool,
    token: &RefreshToken,
    now: chrono::DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(INSERT_TOKEN)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create refresh token")?;
    Ok(result.last_insert_id() as i64)
}

async fn get_by_hash_mysql(pool: &MySqlPool, token_hash: &str) -> Result<Option<RefreshToken>> {
    let row = sqlx::query(SELECT_BY_HASH)
        .bind(token_hash)
        .fetch_optional(pool)
        .await
        .context("Failed to get refresh token")?;

    Ok(row.map(|r| RefreshToken {
        id: r.get("id"),
        user_id: r.get("user_id"),
        token_hash: r.get("token_hash"),
        expires_at: r.get("expires_at"),
        revoked_at: r.get("revoked_at"),
        created_at: r.get("created_at"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations::run_migrations};
    use crate::models::{User, UserRole};
    use chrono::Duration;

    async fn setup() -> (SqlxRefreshTokenRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let user = users
            .create(&User::new(
                "Owner".to_string(),
                "owner@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .expect("Failed to create user");

        (SqlxRefreshTokenRepository::new(pool), user.id)
    }

    #[tokio::test]
    async fn test_create_and_get_by_hash() {
        let (repo, user_id) = setup().await;
        let expires = Utc::now() + Duration::days(7);

        let created = repo
            .create(&RefreshToken::new(user_id, "digest-1".to_string(), expires))
            .await
            .expect("Failed to create token");
        assert!(created.id > 0);

        let found = repo.get_by_hash("digest-1").await.unwrap().expect("missing token");
        assert_eq!(found.user_id, user_id);
        assert!(found.revoked_at.is_none());
        assert!(repo.get_by_hash("digest-unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_is_single_shot() {
        let (repo, user_id) = setup().await;
        let token = repo
            .create(&RefreshToken::new(user_id, "digest-2".to_string(), Utc::now() + Duration::days(1)))
            .await
            .unwrap();

        assert!(repo.revoke(token.id).await.unwrap());
        assert!(!repo.revoke(token.id).await.unwrap());

        let found = repo.get_by_hash("digest-2").await.unwrap().unwrap();
        assert!(found.is_revoked());
    }

    #[tokio::test]
    async fn test_revoke_all_for_user() {
        let (repo, user_id) = setup().await;
        for i in 0..3 {
            repo.create(&RefreshToken::new(
                user_id,
                format!("digest-all-{}", i),
                Utc::now() + Duration::days(1),
            ))
            .await
            .unwrap();
        }

        assert_eq!(repo.revoke_all_for_user(user_id).await.unwrap(), 3);
        assert_eq!(repo.revoke_all_for_user(user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let (repo, user_id) = setup().await;
        repo.create(&RefreshToken::new(user_id, "old".to_string(), Utc::now() - Duration::hours(1)))
            .await
            .unwrap();
        repo.create(&RefreshToken::new(user_id, "fresh".to_string(), Utc::now() + Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert!(repo.get_by_hash("old").await.unwrap().is_none());
        assert!(repo.get_by_hash("fresh").await.unwrap().is_some());
    }
}
