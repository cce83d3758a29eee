//! Redis implementation of the storefront key-value store.
//!
//! [`RedisStore`] backs distributed locks, caches and rate-limit counters.
//! Conditional writes map to `SET NX PX`; lock release and counter creation
//! run as Lua scripts so they stay atomic on the server.
//!
//! # Example
//!
//! ```no_run
//! use storefront_core::store::KeyValueStore;
//! use storefront_redis::RedisStore;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisStore::connect("redis://127.0.0.1:6379").await?;
//! store.set("greeting", "hello", Some(Duration::from_secs(60))).await?;
//! assert_eq!(store.get("greeting").await?, Some("hello".to_string()));
//! # Ok(())
//! # }
//! ```

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};
use std::fmt;
use std::time::Duration;
use storefront_core::error::StoreError;
use storefront_core::store::{KeyValueStore, Result};

/// Delete the key only while it still holds the caller's token.
const COMPARE_AND_DELETE: &str = r"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
    return 0
";

/// Increment, attaching the expiry only when the counter was just created.
const INCREMENT_WITH_TTL: &str = r"
    local value = redis.call('INCR', KEYS[1])
    if value == 1 then
        redis.call('PEXPIRE', KEYS[1], ARGV[1])
    end
    return value
";

/// `Redis`-backed [`KeyValueStore`].
///
/// Cloning is cheap: clones share one multiplexed connection that reconnects
/// on failure.
#[derive(Clone)]
pub struct RedisStore {
    conn_manager: ConnectionManager,
    key_prefix: String,
    compare_and_delete: Script,
    increment: Script,
}

impl RedisStore {
    /// Connect to `Redis`.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - `Redis` connection URL (e.g., "<redis://127.0.0.1:6379>")
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Connection(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::Connection(format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::info!("Connected to Redis");

        Ok(Self {
            conn_manager,
            key_prefix: String::new(),
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
            increment: Script::new(INCREMENT_WITH_TTL),
        })
    }

    /// Namespace every key, e.g. `"storefront:"`, so several deployments can
    /// share one `Redis`.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Round-trip a `PING`.
    ///
    /// # Errors
    ///
    /// Returns error if `Redis` is unreachable.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl KeyValueStore for RedisStore {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.key(key)).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(millis(ttl));
        }

        let _: () = cmd.query_async(&mut conn).await.map_err(store_error)?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn_manager.clone();

        // `OK` when written, nil when the key already exists
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(key))
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;

        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn_manager.clone();
        let value: Option<String> = conn.get(self.key(key)).await.map_err(store_error)?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let removed: u64 = conn.del(self.key(key)).await.map_err(store_error)?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let exists: bool = conn.exists(self.key(key)).await.map_err(store_error)?;
        Ok(exists)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let removed: u64 = self
            .compare_and_delete
            .key(self.key(key))
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(removed > 0)
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64> {
        let mut conn = self.conn_manager.clone();
        let value: u64 = self
            .increment
            .key(self.key(key))
            .arg(millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(value)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.conn_manager.clone();
        // -2: missing, -1: no expiry
        let remaining: i64 = conn.pttl(self.key(key)).await.map_err(store_error)?;
        Ok(u64::try_from(remaining).ok().map(Duration::from_millis))
    }
}

/// `PX` argument for `ttl`; `Redis` rejects zero.
fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn store_error(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        StoreError::Connection(e.to_string())
    } else {
        StoreError::Command(e.to_string())
    }
}
