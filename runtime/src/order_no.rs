//! Human-facing order numbers.
//!
//! Layout (25 characters):
//!
//! ```text
//! ORD 20250101083015 0042 0007
//! │   │              │    └─ per-generator sequence, mod 10000
//! │   │              └────── user id, mod 10000
//! │   └───────────────────── UTC timestamp, second precision
//! └───────────────────────── fixed prefix
//! ```
//!
//! Numbers are unique while one generator issues fewer than 10,000 numbers
//! per second for the same user suffix. The database's unique constraint on
//! the order number catches anything beyond that.

use std::sync::atomic::{AtomicU64, Ordering};
use storefront_core::environment::Clock;
use storefront_core::types::UserId;

/// Fixed prefix of every order number.
pub const PREFIX: &str = "ORD";

/// Length of a generated order number.
pub const LENGTH: usize = 25;

/// Generates order numbers from an injected clock and an owned counter.
#[derive(Debug)]
pub struct OrderNumberGenerator<C> {
    clock: C,
    sequence: AtomicU64,
}

impl<C: Clock> OrderNumberGenerator<C> {
    /// Create a generator whose sequence starts at zero.
    #[must_use]
    pub const fn new(clock: C) -> Self {
        Self {
            clock,
            sequence: AtomicU64::new(0),
        }
    }

    /// Next order number for `user`.
    #[must_use]
    pub fn generate(&self, user: UserId) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1) % 10_000;
        format!(
            "{PREFIX}{}{:04}{:04}",
            self.clock.now().format("%Y%m%d%H%M%S"),
            user.value() % 10_000,
            sequence
        )
    }
}

/// Whether `value` has the shape of a generated order number.
#[must_use]
pub fn is_well_formed(value: &str) -> bool {
    value.len() == LENGTH
        && value.starts_with(PREFIX)
        && value[PREFIX.len()..].bytes().all(|b| b.is_ascii_digit())
}
