//! Postgres-backed counter store.
//!
//! Uses `PostgreSQL` to synchronize rate-limit and lockout state across
//! multiple service instances. Every operation is a single statement, so
//! concurrent callers never lose an increment; the database clock owns
//! expiry.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::Instrument;

use super::CounterStore;

const SCHEMA_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS warden_kv (
        key        TEXT PRIMARY KEY,
        value      TEXT NOT NULL,
        expires_at TIMESTAMPTZ
    )
";

#[derive(Debug, Clone)]
pub struct PgCounterStore {
    pool: PgPool,
}

impl PgCounterStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the backing table when it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .context("failed to create warden_kv table")?;
        Ok(())
    }

    fn deadline(ttl: Option<Duration>) -> Option<DateTime<Utc>> {
        ttl.and_then(|ttl| {
            chrono::Duration::from_std(ttl)
                .ok()
                .map(|ttl| Utc::now() + ttl)
        })
    }
}

#[async_trait]
impl CounterStore for PgCounterStore {
    async fn incr(&self, key: &str) -> Result<i64> {
        // Expired rows restart at 1 with no expiry, matching a fresh key.
        let query = r"
            INSERT INTO warden_kv (key, value, expires_at)
            VALUES ($1, '1', NULL)
            ON CONFLICT (key) DO UPDATE SET
                value = CASE
                    WHEN warden_kv.expires_at IS NOT NULL AND warden_kv.expires_at <= NOW()
                    THEN '1'
                    ELSE (warden_kv.value::bigint + 1)::text
                END,
                expires_at = CASE
                    WHEN warden_kv.expires_at IS NOT NULL AND warden_kv.expires_at <= NOW()
                    THEN NULL
                    ELSE warden_kv.expires_at
                END
            RETURNING value::bigint AS count
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT"
        );
        let row = sqlx::query(query)
            .bind(key)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to increment counter")?;
        Ok(row.get("count"))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let query = r"
            UPDATE warden_kv
            SET expires_at = NOW() + $2::interval
            WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW())
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE"
        );
        let result = sqlx::query(query)
            .bind(key)
            .bind(format!("{} seconds", ttl.as_secs()))
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to set expiry")?;
        Ok(result.rows_affected() > 0)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let query = r"
            SELECT expires_at
            FROM warden_kv
            WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW())
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT"
        );
        let row = sqlx::query(query)
            .bind(key)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to read expiry")?;
        let Some(row) = row else {
            return Ok(None);
        };
        let expires_at: Option<DateTime<Utc>> = row.get("expires_at");
        Ok(expires_at.and_then(|at| (at - Utc::now()).to_std().ok()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let query = r"
            SELECT value
            FROM warden_kv
            WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW())
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT"
        );
        let row = sqlx::query(query)
            .bind(key)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to read key")?;
        Ok(row.map(|row| row.get("value")))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let query = r"
            INSERT INTO warden_kv (key, value, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                expires_at = EXCLUDED.expires_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT"
        );
        sqlx::query(query)
            .bind(key)
            .bind(value)
            .bind(Self::deadline(ttl))
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to set key")?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        // The conditional update only fires for expired rows, so a live key
        // is never overwritten.
        let query = r"
            INSERT INTO warden_kv (key, value, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                expires_at = EXCLUDED.expires_at
            WHERE warden_kv.expires_at IS NOT NULL AND warden_kv.expires_at <= NOW()
            RETURNING key
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT"
        );
        let row = sqlx::query(query)
            .bind(key)
            .bind(value)
            .bind(Self::deadline(ttl))
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to set key if absent")?;
        Ok(row.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let query = "DELETE FROM warden_kv WHERE key = $1 RETURNING (expires_at IS NULL OR expires_at > NOW()) AS live";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE"
        );
        let row = sqlx::query(query)
            .bind(key)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete key")?;
        Ok(row.is_some_and(|row| row.get::<bool, _>("live")))
    }

    async fn get_and_delete(&self, key: &str) -> Result<Option<String>> {
        // Single-statement delete-returning, so two racing redemptions can
        // never both observe the value.
        let query = r"
            DELETE FROM warden_kv
            WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW())
            RETURNING value
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE"
        );
        let row = sqlx::query(query)
            .bind(key)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to redeem key")?;
        Ok(row.map(|row| row.get("value")))
    }
}
