//! In-memory key-value store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use storefront_core::error::StoreError;
use storefront_core::store::{KeyValueStore, Result};
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-memory [`KeyValueStore`] for testing.
///
/// Expiry uses `tokio::time::Instant`, so tests running with a paused clock
/// can move past a TTL with `tokio::time::advance`. Every operation runs
/// inside one mutex, which makes `set_nx`, `compare_and_delete` and
/// `increment` atomic.
///
/// [`InMemoryStore::set_unavailable`] makes every call fail with
/// `StoreError::Connection`, for exercising degraded paths.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage (`true`) or recover from one (`false`).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map_or(0, |entries| entries.values().filter(|e| e.is_live(now)).count())
    }

    /// Whether no live keys remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live keys starting with `prefix`, sorted.
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self.entries.lock().map_or_else(
            |_| Vec::new(),
            |entries| {
                entries
                    .iter()
                    .filter(|(k, e)| k.starts_with(prefix) && e.is_live(now))
                    .map(|(k, _)| k.clone())
                    .collect()
            },
        );
        keys.sort();
        keys
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("store unavailable".to_string()));
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Command("Mutex lock failed".to_string()))?;
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(entries)
    }
}

impl KeyValueStore for InMemoryStore {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.entries()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries()?;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries()?;
        Ok(entries.get(key).map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries()?;
        Ok(entries.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let entries = self.entries()?;
        Ok(entries.contains_key(key))
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        let mut entries = self.entries()?;
        if entries.get(key).is_some_and(|e| e.value == expected) {
            entries.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64> {
        let mut entries = self.entries()?;
        if let Some(entry) = entries.get_mut(key) {
            let current: u64 = entry.value.parse().map_err(|_| {
                StoreError::Command(format!("value at {key} is not an integer"))
            })?;
            let next = current.saturating_add(1);
            entry.value = next.to_string();
            return Ok(next);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: "1".to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(1)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let entries = self.entries()?;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }
}
