//! SQLite storage implementation
//!
//! Persistent storage for OAuth state and token records. The atomic
//! take-once on state records is a single `DELETE ... RETURNING`, so two
//! concurrent callbacks presenting the same state race on one row delete
//! and at most one wins.

use super::*;
use crate::model::{OAuthStateRecord, Provider, StoredToken};
use crate::{Result, TrackbeatError};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use std::path::Path;
use std::str::FromStr;

/// SQLite storage backend
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage
    ///
    /// # Arguments
    /// * `dsn` - Database path (e.g., ".trackbeat/trackbeat.db" or ":memory:")
    pub async fn new(dsn: &str) -> Result<Self> {
        // Prepend sqlite: prefix if not present and add create-if-missing option
        let connection_string = if dsn.starts_with("sqlite:") {
            if dsn.contains('?') {
                dsn.to_string()
            } else {
                format!("{}?mode=rwc", dsn)
            }
        } else {
            format!("sqlite:{}?mode=rwc", dsn)
        };

        // Extract actual file path for directory creation
        let file_path = dsn.strip_prefix("sqlite:").unwrap_or(dsn);

        // Validate path to prevent directory traversal attacks
        if file_path.contains("..") {
            return Err(TrackbeatError::config(
                "Database path cannot contain '..' (path traversal not allowed)",
            ));
        }

        // Create parent directory if needed (unless it's :memory:)
        if file_path != ":memory:"
            && let Some(parent) = Path::new(file_path).parent()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let pool = SqlitePool::connect(&connection_string)
            .await
            .map_err(|e| TrackbeatError::storage(format!("Failed to connect to SQLite: {}", e)))?;

        // Configure SQLite for better behavior under concurrent handlers
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&pool)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| TrackbeatError::storage(format!("Failed to run migrations: {}", e)))?;

        Ok(Self { pool })
    }

    fn parse_state(row: &SqliteRow) -> Result<OAuthStateRecord> {
        Ok(OAuthStateRecord {
            state: row.try_get("state")?,
            provider: Provider::from_str(&row.try_get::<String, _>("provider")?)?,
            code_verifier: row.try_get("code_verifier")?,
            created_at: DateTime::from_timestamp(row.try_get("created_at")?, 0)
                .unwrap_or_else(Utc::now),
            expires_at: DateTime::from_timestamp(row.try_get("expires_at")?, 0)
                .unwrap_or_else(Utc::now),
        })
    }

    fn parse_token(row: &SqliteRow) -> Result<StoredToken> {
        Ok(StoredToken {
            provider: Provider::from_str(&row.try_get::<String, _>("provider")?)?,
            access_token: row.try_get("access_token")?,
            refresh_token: row.try_get("refresh_token")?,
            expires_at: row
                .try_get::<Option<i64>, _>("expires_at")?
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            scope: row.try_get("scope")?,
            updated_at: DateTime::from_timestamp(row.try_get("updated_at")?, 0)
                .unwrap_or_else(Utc::now),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn save_state(&self, record: &OAuthStateRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO oauth_states (state, provider, code_verifier, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.state)
        .bind(record.provider.as_str())
        .bind(&record.code_verifier)
        .bind(record.created_at.timestamp())
        .bind(record.expires_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn take_state(&self, state: &str) -> Result<Option<OAuthStateRecord>> {
        // Single conditional delete-and-return; linearizable per state key.
        let row = sqlx::query(
            "DELETE FROM oauth_states WHERE state = ?
             RETURNING state, provider, code_verifier, created_at, expires_at",
        )
        .bind(state)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let record = Self::parse_state(&row)?;
                // A consumed-but-expired record is reported as absent.
                Ok(Some(record).filter(|r| !r.is_expired()))
            }
            None => Ok(None),
        }
    }

    async fn cleanup_expired_states(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM oauth_states WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn save_token(&self, token: &StoredToken) -> Result<()> {
        sqlx::query(
            "INSERT INTO oauth_tokens (provider, access_token, refresh_token, expires_at, scope, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (provider) DO UPDATE SET
                 access_token = excluded.access_token,
                 refresh_token = excluded.refresh_token,
                 expires_at = excluded.expires_at,
                 scope = excluded.scope,
                 updated_at = excluded.updated_at",
        )
        .bind(token.provider.as_str())
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expires_at.map(|t| t.timestamp()))
        .bind(&token.scope)
        .bind(token.updated_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_token(&self, provider: Provider) -> Result<Option<StoredToken>> {
        let row = sqlx::query(
            "SELECT provider, access_token, refresh_token, expires_at, scope, updated_at
             FROM oauth_tokens WHERE provider = ?",
        )
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::parse_token(&r)).transpose()
    }
}
