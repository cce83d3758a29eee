//! Distributed mutual exclusion over the shared key-value store.
//!
//! A lock is a key under `lock:` holding a random owner token, written with
//! set-if-absent and a TTL. Only the holder of the matching token removes it;
//! an expired lock is free for anyone.
//!
//! # Example
//!
//! ```rust,no_run
//! use storefront_runtime::{CancellationToken, LockError, LockManager};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example(store: Arc<impl storefront_core::store::KeyValueStore>) -> Result<(), LockError> {
//! let locks = LockManager::new(store);
//! let cancel = CancellationToken::new();
//!
//! let total = locks
//!     .with_lock("order:create:user:7", Duration::from_secs(30), &cancel, || async {
//!         // Only one process runs this at a time
//!         Ok::<_, LockError>(42)
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::metrics::LockMetrics;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use storefront_core::error::{OrderError, StoreError};
use storefront_core::store::KeyValueStore;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const KEY_PREFIX: &str = "lock:";

/// Errors from lock operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Every attempt found the lock held.
    #[error("Lock {key} still busy after {attempts} attempts")]
    Busy {
        /// Lock key (without namespace)
        key: String,
        /// Attempts made
        attempts: u32,
    },

    /// The caller cancelled while waiting.
    #[error("Lock acquisition for {key} cancelled")]
    Cancelled {
        /// Lock key (without namespace)
        key: String,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<LockError> for OrderError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::Busy { key, .. } => Self::LockBusy { key },
            LockError::Cancelled { .. } => Self::Cancelled,
            LockError::Store(e) => Self::Storage(e.to_string()),
        }
    }
}

/// Fixed-backoff retry policy for lock acquisition.
///
/// # Default Values
///
/// - `max_retries`: 5 (six attempts in total)
/// - `retry_interval`: 100ms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRetry {
    /// Attempts after the first one
    pub max_retries: u32,
    /// Pause between attempts
    pub retry_interval: Duration,
}

impl Default for LockRetry {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_interval: Duration::from_millis(100),
        }
    }
}

impl LockRetry {
    /// Never retry: one attempt only.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            retry_interval: Duration::ZERO,
        }
    }

    /// Total attempts including the first.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Proof of holding a lock.
///
/// Hand it back to [`LockManager::release`]. A guard that is dropped instead
/// keeps the lock until its TTL runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "an unreleased lock stays held until its TTL expires"]
pub struct LockGuard {
    key: String,
    token: String,
    ttl: Duration,
}

impl LockGuard {
    /// Lock key without the namespace.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Owner token written into the store.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// TTL the lock was written with.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Lock manager over a shared store.
#[derive(Debug)]
pub struct LockManager<S> {
    store: Arc<S>,
    retry: LockRetry,
}

impl<S> Clone for LockManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            retry: self.retry,
        }
    }
}

impl<S: KeyValueStore> LockManager<S> {
    /// Create a manager with the default retry policy.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            retry: LockRetry::default(),
        }
    }

    /// Retry policy used by [`LockManager::with_lock`].
    #[must_use]
    pub const fn with_retry(mut self, retry: LockRetry) -> Self {
        self.retry = retry;
        self
    }

    fn store_key(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }

    /// Make one attempt. `None` means someone else holds the lock.
    ///
    /// # Errors
    ///
    /// Returns `LockError::Store` if the store fails.
    pub async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockGuard>, LockError> {
        let token = Uuid::new_v4().to_string();
        let acquired = self.store.set_nx(&Self::store_key(key), &token, ttl).await?;

        Ok(acquired.then(|| LockGuard {
            key: key.to_string(),
            token,
            ttl,
        }))
    }

    /// Acquire the lock, retrying with fixed backoff.
    ///
    /// Each attempt uses a fresh owner token. No sleep follows the last
    /// attempt.
    ///
    /// # Errors
    ///
    /// - `LockError::Busy` once every attempt found the lock held
    /// - `LockError::Cancelled` if `cancel` fires first
    /// - `LockError::Store` if the store fails
    pub async fn acquire(
        &self,
        key: &str,
        ttl: Duration,
        retry: &LockRetry,
        cancel: &CancellationToken,
    ) -> Result<LockGuard, LockError> {
        let started = Instant::now();
        let attempts = retry.attempts();

        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                LockMetrics::record_cancelled();
                return Err(LockError::Cancelled { key: key.to_string() });
            }

            if let Some(guard) = self.try_acquire(key, ttl).await? {
                LockMetrics::record_acquired(started.elapsed());
                tracing::debug!(key = %key, attempt = attempt, "Lock acquired");
                return Ok(guard);
            }

            tracing::debug!(key = %key, attempt = attempt, attempts = attempts, "Lock held elsewhere");

            if attempt < attempts {
                tokio::select! {
                    () = cancel.cancelled() => {
                        LockMetrics::record_cancelled();
                        return Err(LockError::Cancelled { key: key.to_string() });
                    }
                    () = tokio::time::sleep(retry.retry_interval) => {}
                }
            }
        }

        LockMetrics::record_busy();
        tracing::warn!(key = %key, attempts = attempts, "Lock still busy, giving up");
        Err(LockError::Busy {
            key: key.to_string(),
            attempts,
        })
    }

    /// Release a lock if this guard still owns it.
    ///
    /// Returns `false` when the lock already expired or now belongs to
    /// someone else; nothing is removed in that case.
    ///
    /// # Errors
    ///
    /// Returns `LockError::Store` if the store fails.
    pub async fn release(&self, guard: LockGuard) -> Result<bool, LockError> {
        let released = self
            .store
            .compare_and_delete(&Self::store_key(&guard.key), &guard.token)
            .await?;

        if released {
            tracing::debug!(key = %guard.key, "Lock released");
        } else {
            LockMetrics::record_stale_release();
            tracing::warn!(key = %guard.key, "Lock expired before release");
        }
        Ok(released)
    }

    /// Run `f` while holding the lock, then release it.
    ///
    /// The lock is released whether `f` succeeds, fails or panics; a panic is
    /// resumed after the release. Release failures are logged and never
    /// replace the result of `f`.
    ///
    /// # Errors
    ///
    /// Returns the acquisition error converted into `E`, or whatever `f`
    /// returns.
    pub async fn with_lock<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        cancel: &CancellationToken,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let guard = self.acquire(key, ttl, &self.retry, cancel).await?;

        let outcome = AssertUnwindSafe(f()).catch_unwind().await;

        if let Err(e) = self.release(guard).await {
            tracing::error!(key = %key, error = %e, "Failed to release lock");
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
