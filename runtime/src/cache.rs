//! TTL cache over the shared key-value store.
//!
//! Strings are stored raw; anything else goes through `serde_json`. Keys are
//! namespaced under `cache:`.
//!
//! [`CacheService::obtain`] is a plain read-through: concurrent misses may all
//! run the generator. Wrap generation in a lock when that matters.

use crate::metrics::CacheMetrics;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use storefront_core::error::StoreError;
use storefront_core::store::KeyValueStore;
use uuid::Uuid;

const KEY_PREFIX: &str = "cache:";

/// Version token reported for a key that was never rotated.
pub const INITIAL_VERSION: &str = "0";

/// Cache service over a shared store.
#[derive(Debug)]
pub struct CacheService<S> {
    store: Arc<S>,
}

impl<S> Clone for CacheService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyValueStore> CacheService<S> {
    /// Create a cache over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn store_key(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }

    /// Store a string.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.store.set(&Self::store_key(key), value, Some(ttl)).await
    }

    /// Store a value as JSON.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the store fails.
    pub async fn set_object<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        let json = serde_json::to_string(value)?;
        self.set(key, &json, ttl).await
    }

    /// Read a string.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self.store.get(&Self::store_key(key)).await?;
        if value.is_some() {
            CacheMetrics::record_hit();
        } else {
            CacheMetrics::record_miss();
        }
        tracing::debug!(key = %key, hit = value.is_some(), "Cache read");
        Ok(value)
    }

    /// Read and decode a JSON value.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or the stored value does not decode
    /// as `T`.
    pub async fn get_object<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Remove a key. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.store.delete(&Self::store_key(key)).await
    }

    /// Whether a key holds a live value.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.store.exists(&Self::store_key(key)).await
    }

    /// Return the cached string, or produce, cache and return it.
    ///
    /// Cache failures degrade to calling `f`; only `f`'s error surfaces.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns on a miss.
    pub async fn obtain<E, F, Fut>(&self, key: &str, ttl: Duration, f: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        match self.get(key).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => {
                CacheMetrics::record_error();
                tracing::warn!(key = %key, error = %e, "Cache read failed, regenerating");
            }
        }

        let value = f().await?;
        if let Err(e) = self.set(key, &value, ttl).await {
            CacheMetrics::record_error();
            tracing::warn!(key = %key, error = %e, "Cache write failed");
        }
        Ok(value)
    }

    /// Return the cached value, or produce, cache and return it.
    ///
    /// A stored value that no longer decodes is treated as a miss.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns on a miss.
    pub async fn obtain_object<T, E, F, Fut>(&self, key: &str, ttl: Duration, f: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.get_object::<T>(key).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => {
                CacheMetrics::record_error();
                tracing::warn!(key = %key, error = %e, "Cache read failed, regenerating");
            }
        }

        let value = f().await?;
        if let Err(e) = self.set_object(key, &value, ttl).await {
            CacheMetrics::record_error();
            tracing::warn!(key = %key, error = %e, "Cache write failed");
        }
        Ok(value)
    }

    /// Current version token of a key family, [`INITIAL_VERSION`] if never rotated.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn version(&self, key: &str) -> Result<String, StoreError> {
        Ok(self
            .store
            .get(&Self::store_key(key))
            .await?
            .unwrap_or_else(|| INITIAL_VERSION.to_string()))
    }

    /// Replace the version token of a key family, orphaning every entry
    /// cached under the old token.
    ///
    /// Tokens are random so a version never repeats. `ttl` must outlive the
    /// entries keyed by the version; otherwise an expired token falls back
    /// to [`INITIAL_VERSION`] while entries cached under it are still live.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn rotate_version(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        let token = Uuid::new_v4().simple().to_string();
        self.store.set(&Self::store_key(key), &token, Some(ttl)).await?;
        tracing::debug!(key = %key, version = %token, "Cache version rotated");
        Ok(token)
    }
}
