use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{StateStore, expires_at, remaining};
use crate::utils::Clock;
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-process [`StateStore`].
///
/// Each operation holds a single lock for its whole read-modify-write, which
/// makes the conditional operations atomic. Expiry is evaluated lazily against
/// the injected clock.
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStateStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn live_value<'a>(
        entries: &'a HashMap<String, Entry>,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<&'a Entry> {
        entries.get(key).filter(|e| e.is_live(now))
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let entries = self.entries.lock();
        Ok(Self::live_value(&entries, key, now).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let now = self.clock.now();
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: expires_at(now, ttl),
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        self.compare_and_swap(key, None, value, ttl).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let current = Self::live_value(&entries, key, now).map(|e| e.value.as_str());
        if current != expected {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: new.to_string(),
                expires_at: expires_at(now, ttl),
            },
        );
        Ok(true)
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let (current, expiry) = match Self::live_value(&entries, key, now) {
            Some(entry) => {
                let current = entry.value.parse::<i64>().map_err(|_| {
                    Error::Other(format!("value at '{key}' is not an integer counter"))
                })?;
                (current, entry.expires_at)
            }
            None => (0, None),
        };
        let next = current + 1;
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at: expiry,
            },
        );
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = self.clock.now();
        let removed = self.entries.lock().remove(key);
        Ok(removed.is_some_and(|e| e.is_live(now)))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = self.clock.now();
        let entries = self.entries.lock();
        Ok(Self::live_value(&entries, key, now)
            .and_then(|e| e.expires_at)
            .and_then(|at| remaining(now, at)))
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        Ok((before - entries.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
