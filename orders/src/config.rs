//! Orchestrator tuning.

use std::time::Duration;
use storefront_runtime::LockRetry;

/// Lock and cache lifetimes used by the order service.
///
/// # Default Values
///
/// - `create_lock_ttl`: 30 seconds
/// - `status_lock_ttl`: 30 seconds
/// - `lock_retry`: 5 retries, 100ms apart
/// - `order_cache_ttl`: 30 minutes
/// - `list_cache_ttl`: 5 minutes
/// - `list_version_ttl`: 1 hour (must exceed `list_cache_ttl`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderServiceConfig {
    /// TTL of the order-creation lock
    pub create_lock_ttl: Duration,
    /// TTL of the status-update lock
    pub status_lock_ttl: Duration,
    /// Acquisition retries for both locks
    pub lock_retry: LockRetry,
    /// TTL of cached single orders
    pub order_cache_ttl: Duration,
    /// TTL of cached order listings
    pub list_cache_ttl: Duration,
    /// TTL of a user's listing version token
    pub list_version_ttl: Duration,
}

impl Default for OrderServiceConfig {
    fn default() -> Self {
        Self {
            create_lock_ttl: Duration::from_secs(30),
            status_lock_ttl: Duration::from_secs(30),
            lock_retry: LockRetry::default(),
            order_cache_ttl: Duration::from_secs(30 * 60),
            list_cache_ttl: Duration::from_secs(5 * 60),
            list_version_ttl: Duration::from_secs(60 * 60),
        }
    }
}

impl OrderServiceConfig {
    /// Version tokens must outlive the listings keyed by them.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.list_version_ttl <= self.list_cache_ttl {
            self.list_version_ttl = self.list_cache_ttl * 2;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_stretches_short_version_ttl() {
        let config = OrderServiceConfig {
            list_version_ttl: Duration::from_secs(10),
            ..OrderServiceConfig::default()
        }
        .normalized();
        assert_eq!(config.list_version_ttl, Duration::from_secs(600));
    }
}
