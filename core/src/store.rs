//! Shared key-value store abstraction.
//!
//! Locks, caches and rate limiters all coordinate across server processes
//! through one store with TTL support. The operations below are the complete
//! contract; implementations must make `set_nx`, `compare_and_delete` and
//! `increment` atomic with respect to other clients.

use crate::error::StoreError;
use std::time::Duration;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Key-value store with per-key expiry.
///
/// # Example
///
/// ```no_run
/// use storefront_core::store::KeyValueStore;
/// use std::time::Duration;
///
/// # async fn example(store: impl KeyValueStore) -> storefront_core::store::Result<()> {
/// if store.set_nx("lock:order:1", "token", Duration::from_secs(30)).await? {
///     // ... critical section ...
///     store.compare_and_delete("lock:order:1", "token").await?;
/// }
/// # Ok(())
/// # }
/// ```
pub trait KeyValueStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    ///
    /// `None` keeps the key until it is deleted.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Store `value` only if `key` is absent. Returns whether it was stored.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Read the value under `key`; expired keys read as `None`.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn get(&self, key: &str) -> impl std::future::Future<Output = Result<Option<String>>> + Send;

    /// Remove `key`. Returns whether a live key was removed.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn delete(&self, key: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Whether `key` currently holds a live value.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn exists(&self, key: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Remove `key` only if it currently holds `expected`, atomically.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn compare_and_delete(
        &self,
        key: &str,
        expected: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Atomically increment the counter under `key` and return the new value.
    ///
    /// A missing key starts from zero and receives `ttl`; an existing key
    /// keeps its remaining expiry.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails or the key holds a
    /// non-integer value.
    fn increment(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// Remaining lifetime of `key`, `None` if missing or persistent.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn ttl(&self, key: &str) -> impl std::future::Future<Output = Result<Option<Duration>>> + Send;
}
