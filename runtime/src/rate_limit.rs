//! Fixed-window rate limiting per client.
//!
//! Each client gets a counter at `rate_limit:{client}` that lives for one
//! window. The first request creates it with the window as TTL; every request
//! increments it atomically. Requests beyond `max_requests` are rejected until
//! the counter expires.
//!
//! The limiter fails open: if the store is unreachable the request is allowed
//! and a warning is logged.

use crate::metrics::RateLimitMetrics;
use std::sync::Arc;
use std::time::Duration;
use storefront_core::store::KeyValueStore;

const KEY_PREFIX: &str = "rate_limit:";

/// Rate limit budget.
///
/// # Default Values
///
/// - `max_requests`: 100
/// - `window`: 60 seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub max_requests: u64,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
        }
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request admitted
    Allowed {
        /// Requests allowed per window
        limit: u64,
        /// Requests left in the current window
        remaining: u64,
    },
    /// Request rejected
    Limited {
        /// Requests allowed per window
        limit: u64,
        /// Time until the window resets
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    /// Whether the request may proceed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Fixed-window limiter over a shared store.
#[derive(Debug)]
pub struct FixedWindowRateLimiter<S> {
    store: Arc<S>,
    config: RateLimitConfig,
}

impl<S> Clone for FixedWindowRateLimiter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config,
        }
    }
}

impl<S: KeyValueStore> FixedWindowRateLimiter<S> {
    /// Create a limiter.
    #[must_use]
    pub const fn new(store: Arc<S>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Configured budget.
    #[must_use]
    pub const fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Count a request from `client` and decide whether it may proceed.
    pub async fn check(&self, client: &str) -> RateLimitDecision {
        let key = format!("{KEY_PREFIX}{client}");
        let limit = self.config.max_requests;

        let count = match self.store.increment(&key, self.config.window).await {
            Ok(count) => count,
            Err(e) => {
                RateLimitMetrics::record_fail_open();
                tracing::warn!(client = %client, error = %e, "Rate limit store unavailable, allowing request");
                return RateLimitDecision::Allowed {
                    limit,
                    remaining: limit,
                };
            }
        };

        if count > limit {
            let retry_after = match self.store.ttl(&key).await {
                Ok(Some(ttl)) => ttl,
                _ => self.config.window,
            };
            RateLimitMetrics::record_rejected();
            tracing::warn!(
                rate_limit_exceeded = true,
                client = %client,
                count = count,
                limit = limit,
                "Rate limit exceeded"
            );
            return RateLimitDecision::Limited { limit, retry_after };
        }

        RateLimitMetrics::record_allowed();
        RateLimitDecision::Allowed {
            limit,
            remaining: limit - count,
        }
    }
}
