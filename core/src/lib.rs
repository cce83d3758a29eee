//! # Storefront Core
//!
//! Domain types and the seams of the order-creation core.
//!
//! This crate owns everything the other storefront crates agree on:
//!
//! - **Types**: orders, line items, money, ids, order intents and pagination
//! - **Errors**: one `thiserror` enum per layer (store, repository, order)
//! - **Store**: the [`store::KeyValueStore`] trait backing locks, caches and rate limits
//! - **Repository**: relational persistence traits for addresses, products, carts and orders
//! - **Environment**: injected dependencies such as the [`environment::Clock`]
//!
//! Implementations live elsewhere: Redis and `PostgreSQL` adapters in their own
//! crates, in-memory doubles in `storefront-testing`.

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod error;
pub mod repository;
pub mod store;
pub mod types;

/// Environment module - injected dependencies
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use storefront_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time from the operating system.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
        fn now(&self) -> DateTime<Utc> {
            (**self).now()
        }
    }
}
