//! # Storefront Testing
//!
//! Testing utilities for the storefront crates.
//!
//! This crate provides:
//! - [`InMemoryStore`]: a [`KeyValueStore`](storefront_core::store::KeyValueStore)
//!   with real TTL semantics and outage simulation
//! - [`InMemoryRepository`]: every repository trait over one mutex, so
//!   `create_order` is a true transaction
//! - [`mocks::FixedClock`]: deterministic time
//! - Fixture builders for addresses, products and cart lines
//!
//! ## Example
//!
//! ```
//! use storefront_testing::{fixtures, InMemoryRepository};
//!
//! let repo = InMemoryRepository::new();
//! repo.insert_product(fixtures::product(1, 1000, 5));
//! assert_eq!(repo.product(storefront_core::types::ProductId::new(1)).map(|p| p.stock), Some(5));
//! ```

use chrono::{DateTime, Utc};
use storefront_core::environment::Clock;

mod repository;
mod store;

pub use repository::InMemoryRepository;
pub use store::InMemoryStore;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::Mutex;

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until [`FixedClock::set`] moves it.
    ///
    /// # Example
    ///
    /// ```
    /// use storefront_testing::mocks::FixedClock;
    /// use storefront_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time: Mutex::new(time) }
        }

        /// Move the clock to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            if let Ok(mut current) = self.time.lock() {
                *current = time;
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: chrono::Duration) {
            if let Ok(mut current) = self.time.lock() {
                *current += by;
            }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
                .lock()
                .map_or_else(|poisoned| *poisoned.into_inner(), |time| *time)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Record builders with sensible defaults
pub mod fixtures {
    use storefront_core::types::{
        Address, AddressId, CartItem, CartItemId, Money, Product, ProductId, UserId,
    };

    /// Address `id` owned by `user`
    #[must_use]
    pub fn address(id: u64, user: u64) -> Address {
        Address {
            id: AddressId::new(id),
            user_id: UserId::new(user),
            name: "Zhang San".to_string(),
            phone: "13800138000".to_string(),
            province: "Guangdong".to_string(),
            city: "Shenzhen".to_string(),
            district: "Nanshan".to_string(),
            detail: "Keji Road 1".to_string(),
        }
    }

    /// Product `id` priced at `price_cents` with `stock` units
    #[must_use]
    pub fn product(id: u64, price_cents: u64, stock: u32) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Money::from_cents(price_cents),
            stock,
            image_url: format!("https://img.example.com/{id}.png"),
            sale_count: 0,
        }
    }

    /// Cart line `id` of `user` holding `quantity` units of `product`
    #[must_use]
    pub const fn cart_item(id: u64, user: u64, product: u64, quantity: u32) -> CartItem {
        CartItem {
            id: CartItemId::new(id),
            user_id: UserId::new(user),
            product_id: ProductId::new(product),
            quantity,
        }
    }
}

/// Install a test subscriber so `tracing` output shows up with `--nocapture`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}
