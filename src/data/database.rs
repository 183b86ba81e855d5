//! SQLite database operations
//!
//! All database access goes through this module.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use super::store::{AccountStore, FollowStore};
use crate::error::AppError;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
fn map_insert_error(error: sqlx::Error, what: &str) -> AppError {
    match &error {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(format!("{} already exists", what))
        }
        _ => AppError::Database(error),
    }
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    async fn upsert_follow(
        &self,
        from_id: &str,
        to_id: &str,
        status: FollowStatus,
    ) -> Result<(), AppError> {
        let stored = status.as_stored().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("cannot store an absent follow edge"))
        })?;
        let now = Utc::now();

        // A Pending request never downgrades a confirmed edge.
        let guard = match status {
            FollowStatus::Pending => "WHERE follows.status <> 'following'",
            _ => "",
        };
        let query = format!(
            r#"
            INSERT INTO follows (id, from_id, to_id, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(from_id, to_id) DO UPDATE SET
                status = excluded.status,
                updated_at = excluded.updated_at
            {}
            "#,
            guard
        );

        sqlx::query(&query)
        .bind(EntityId::new().0)
        .bind(from_id)
        .bind(to_id)
        .bind(stored)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::debug!(from_id, to_id, status = stored, "Follow edge upserted");
        Ok(())
    }

    /// Fetch the raw edge, mostly for inspection in tests and tooling.
    pub async fn get_follow_edge(
        &self,
        from_id: &str,
        to_id: &str,
    ) -> Result<Option<FollowEdge>, AppError> {
        let edge = sqlx::query_as::<_, FollowEdge>(
            "SELECT * FROM follows WHERE from_id = ? AND to_id = ?",
        )
        .bind(from_id)
        .bind(to_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(edge)
    }

    /// Number of registered accounts
    pub async fn count_accounts(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl AccountStore for Database {
    async fn find(&self, id: &str) -> Result<Account, AppError> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<Account, AppError> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn find_by_username(&self, username: &str) -> Result<Account, AppError> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn save(&self, account: &Account) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, username, email, password_hash, private_key_pem, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.private_key_pem)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "account"))?;

        Ok(())
    }
}

#[async_trait]
impl FollowStore for Database {
    async fn follow(&self, from_id: &str, to_id: &str) -> Result<(), AppError> {
        self.upsert_follow(from_id, to_id, FollowStatus::Following)
            .await
    }

    async fn request_follow(&self, from_id: &str, to_id: &str) -> Result<(), AppError> {
        self.upsert_follow(from_id, to_id, FollowStatus::Pending)
            .await
    }

    async fn unfollow(&self, from_id: &str, to_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM follows WHERE from_id = ? AND to_id = ?")
            .bind(from_id)
            .bind(to_id)
            .execute(&self.pool)
            .await?;

        tracing::debug!(
            from_id,
            to_id,
            removed = result.rows_affected(),
            "Follow edge removed"
        );
        Ok(())
    }

    async fn find_follow_status(
        &self,
        from_id: &str,
        to_id: &str,
    ) -> Result<FollowStatus, AppError> {
        let stored = sqlx::query_scalar::<_, String>(
            "SELECT status FROM follows WHERE from_id = ? AND to_id = ?",
        )
        .bind(from_id)
        .bind(to_id)
        .fetch_optional(&self.pool)
        .await?;

        FollowStatus::from_row(stored.as_deref())
    }

    async fn list_followers(&self, id: &str) -> Result<Vec<String>, AppError> {
        let followers = sqlx::query_scalar::<_, String>(
            "SELECT from_id FROM follows WHERE to_id = ? AND status = 'following' ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(followers)
    }

    async fn list_follows(&self, id: &str) -> Result<Vec<String>, AppError> {
        let follows = sqlx::query_scalar::<_, String>(
            "SELECT to_id FROM follows WHERE from_id = ? AND status = 'following' ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(follows)
    }
}
