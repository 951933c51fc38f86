use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::Row;

use super::{StateStore, expires_at, remaining};
use crate::database::DbPool;
use crate::database::time::{datetime_to_ms, ms_to_datetime};
use crate::utils::Clock;
use crate::{Error, Result};

/// [`StateStore`] backed by the `kv_store` table.
///
/// Expiry is stored as epoch milliseconds. Every conditional write is a single
/// statement, so SQLite's write lock makes it atomic across connections and
/// across processes sharing the database file.
pub struct SqliteStateStore {
    pool: DbPool,
    clock: Arc<dyn Clock>,
}

impl SqliteStateStore {
    pub fn new(pool: DbPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    fn now_ms(&self) -> i64 {
        datetime_to_ms(self.clock.now())
    }

    fn expiry_ms(&self, ttl: Option<Duration>) -> Option<i64> {
        expires_at(self.clock.now(), ttl).map(datetime_to_ms)
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT value FROM kv_store WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(key)
        .bind(self.now_ms())
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(self.expiry_ms(ttl))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        // An existing row only yields when it has expired.
        let result = sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
            WHERE kv_store.expires_at IS NOT NULL AND kv_store.expires_at <= ?
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(self.expiry_ms(ttl))
        .bind(self.now_ms())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let Some(expected) = expected else {
            return self.set_if_absent(key, new, ttl).await;
        };

        let result = sqlx::query(
            r#"
            UPDATE kv_store SET value = ?, expires_at = ?
            WHERE key = ? AND value = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(new)
        .bind(self.expiry_ms(ttl))
        .bind(key)
        .bind(expected)
        .bind(self.now_ms())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, expires_at) VALUES (?1, '1', NULL)
            ON CONFLICT(key) DO UPDATE SET
                value = CASE
                    WHEN kv_store.expires_at IS NOT NULL AND kv_store.expires_at <= ?2 THEN '1'
                    ELSE CAST(CAST(kv_store.value AS INTEGER) + 1 AS TEXT)
                END,
                expires_at = CASE
                    WHEN kv_store.expires_at IS NOT NULL AND kv_store.expires_at <= ?2 THEN NULL
                    ELSE kv_store.expires_at
                END
            RETURNING value
            "#,
        )
        .bind(key)
        .bind(self.now_ms())
        .fetch_one(&self.pool)
        .await?;

        let value: String = row.try_get("value")?;
        value
            .parse::<i64>()
            .map_err(|_| Error::Other(format!("value at '{key}' is not an integer counter")))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM kv_store WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(key)
        .bind(self.now_ms())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = self.clock.now();
        let expiry: Option<Option<i64>> = sqlx::query_scalar(
            "SELECT expires_at FROM kv_store WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(key)
        .bind(datetime_to_ms(now))
        .fetch_optional(&self.pool)
        .await?;

        Ok(expiry
            .flatten()
            .and_then(|ms| remaining(now, ms_to_datetime(ms))))
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM kv_store WHERE expires_at IS NOT NULL AND expires_at <= ?")
                .bind(self.now_ms())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
