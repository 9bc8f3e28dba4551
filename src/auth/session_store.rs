//! Revocation denylist for issued tokens.
//!
//! Only the token id (`jti`) and its expiry are kept. Entries are swept once
//! the token they describe has expired, at which point the validator rejects
//! the token on expiry alone.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::clock::Clock;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session store backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or overwrite the entry for `jti`. Once this returns, every
    /// `is_revoked(jti)` call sees it until `expires_at`.
    async fn record_revocation(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn is_revoked(&self, jti: &str) -> Result<bool, StoreError>;

    /// Remove entries whose expiry is strictly before `now`. Returns the number removed.
    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    fn backend(&self) -> &'static str;
}

/// In-process store. Writes take the write half of the lock, so a recorded
/// revocation is visible to every reader that acquires the lock afterwards.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn expiry_of(&self, jti: &str) -> Option<DateTime<Utc>> {
        self.entries.read().await.get(jti).copied()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn record_revocation(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.entries.write().await.insert(jti.to_string(), expires_at);
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, StoreError> {
        Ok(self.entries.read().await.contains_key(jti))
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at >= now);
        Ok((before - entries.len()) as u64)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Postgres-backed store over the `revoked_tokens` table.
///
/// Each write is a single autocommitted statement. Under READ COMMITTED a
/// committed insert is visible to every statement that starts after it, on
/// any connection in the pool.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: Arc<PgPool>,
}

impl PgSessionStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn record_revocation(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (jti, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (jti) DO UPDATE SET expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(jti)
        .bind(expires_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, StoreError> {
        let found: Option<(String,)> = sqlx::query_as("SELECT jti FROM revoked_tokens WHERE jti = $1")
            .bind(jti)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(found.is_some())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

/// Periodically purge expired revocation entries. The returned handle is
/// aborted on shutdown.
pub fn spawn_sweeper(
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
) -> JoinHandle<()> {
    info!("Starting revocation sweeper every {:?} ({} backend)", interval, store.backend());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.sweep(clock.now()).await {
                Ok(0) => {}
                Ok(removed) => debug!("Swept {} expired revocation entries", removed),
                Err(e) => error!("Revocation sweep failed: {}", e),
            }
        }
    })
}
