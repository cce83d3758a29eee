//! # Storefront Runtime
//!
//! Coordination primitives built on a shared
//! [`KeyValueStore`](storefront_core::store::KeyValueStore), so every server
//! process sees the same locks, cache entries and counters.
//!
//! - [`lock::LockManager`]: owner-tokened mutual exclusion with TTL and retries
//! - [`cache::CacheService`]: TTL cache with JSON values and read-through
//! - [`order_no::OrderNumberGenerator`]: human-facing order numbers
//! - [`rate_limit::FixedWindowRateLimiter`]: per-client request budgets
//! - [`metrics`]: Prometheus recorder and per-component counters
//!
//! Key namespaces never overlap: `lock:`, `cache:` and `rate_limit:`.

pub mod cache;
pub mod lock;
pub mod metrics;
pub mod order_no;
pub mod rate_limit;

pub use cache::CacheService;
pub use lock::{LockError, LockGuard, LockManager, LockRetry};
pub use order_no::OrderNumberGenerator;
pub use rate_limit::{FixedWindowRateLimiter, RateLimitConfig, RateLimitDecision};
pub use tokio_util::sync::CancellationToken;
