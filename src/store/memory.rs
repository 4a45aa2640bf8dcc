//! In-memory counter store for tests and single-node deployments.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::CounterStore;

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Process-local store. State does not survive restarts and is not shared
/// across instances; multi-node deployments need [`super::PgCounterStore`].
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCounterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str) -> Result<i64> {
        let mut entries = self.entries.lock().await;
        let next = match entries.get(key) {
            Some(entry) if !entry.expired() => entry.value.parse::<i64>().unwrap_or(0) + 1,
            _ => 1,
        };
        let expires_at = match entries.get(key) {
            Some(entry) if !entry.expired() && next != 1 => entry.expires_at,
            _ => None,
        };
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(entry) if !entry.expired() => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key).filter(|entry| !entry.expired()).and_then(
            |entry| {
                entry
                    .expires_at
                    .map(|at| at.saturating_duration_since(Instant::now()))
            },
        ))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key).is_some_and(|entry| !entry.expired()))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.expired())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|entry| !entry.expired()) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let existed = entries
            .remove(key)
            .is_some_and(|entry| !entry.expired());
        Ok(existed)
    }

    async fn get_and_delete(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        Ok(entries
            .remove(key)
            .filter(|entry| !entry.expired())
            .map(|entry| entry.value))
    }
}
