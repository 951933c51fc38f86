//! Shared key-value state with expiry.
//!
//! Circuit breaker state, idempotency records and the notification id counter
//! live behind [`StateStore`] so that every process instance observes the same
//! values. All conditional operations are atomic with respect to each other.
//!
//! Two implementations are provided:
//! - [`MemoryStateStore`] for a single process and for tests
//! - [`SqliteStateStore`] for instances sharing one SQLite database

mod memory;
mod sqlite;

pub use memory::MemoryStateStore;
pub use sqlite::SqliteStateStore;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::Result;

/// Key-value storage port.
///
/// Expired entries behave exactly like missing ones.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a live value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value unconditionally. `None` means no expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Write a value only if the key is absent (or expired).
    ///
    /// Returns `true` if this call wrote the value.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool>;

    /// Replace the value only if the current live value equals `expected`.
    ///
    /// `expected = None` requires the key to be absent, like [`Self::set_if_absent`].
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Option<Duration>,
    ) -> Result<bool>;

    /// Atomically increment an integer counter, starting from 1.
    async fn increment(&self, key: &str) -> Result<i64>;

    /// Remove a key. Returns `true` if something was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remaining time to live of a live key; `None` if missing or without expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// Drop every expired entry, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64>;

    /// Check the backing storage is reachable.
    async fn ping(&self) -> Result<()>;
}

/// Absolute expiry for a TTL starting at `now`.
pub(crate) fn expires_at(now: DateTime<Utc>, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    ttl.map(|ttl| match chrono::Duration::from_std(ttl) {
        Ok(ttl) => now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        Err(_) => DateTime::<Utc>::MAX_UTC,
    })
}

/// Remaining lifetime of an entry expiring at `expires_at`.
pub(crate) fn remaining(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Option<Duration> {
    (expires_at - now).to_std().ok().filter(|d| !d.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_at() {
        let now = Utc::now();
        assert_eq!(expires_at(now, None), None);
        assert_eq!(
            expires_at(now, Some(Duration::from_secs(600))),
            Some(now + chrono::Duration::seconds(600))
        );
    }

    #[test]
    fn test_remaining_is_none_once_elapsed() {
        let now = Utc::now();
        assert_eq!(remaining(now, now), None);
        assert_eq!(remaining(now, now - chrono::Duration::seconds(1)), None);
        assert_eq!(
            remaining(now, now + chrono::Duration::seconds(5)),
            Some(Duration::from_secs(5))
        );
    }
}
