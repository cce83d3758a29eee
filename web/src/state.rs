//! Application state for Axum handlers.

use std::sync::Arc;
use storefront_orders::{OrderService, PaymentService};
use storefront_runtime::{CancellationToken, FixedWindowRateLimiter};

/// Application state shared across all HTTP handlers.
///
/// Generic over the repository `R`, store `S`, clock `C` and payment gateway
/// `G` so the same router runs against production adapters and in-memory
/// doubles.
pub struct AppState<R, S, C, G> {
    /// Order orchestrator
    pub orders: Arc<OrderService<R, S, C>>,
    /// Mock payment flow
    pub payments: Arc<PaymentService<R, S, C, G>>,
    /// Per-client request budget
    pub rate_limiter: FixedWindowRateLimiter<S>,
    /// Cancelled on shutdown; lock waiters in handlers observe it
    pub shutdown: CancellationToken,
}

impl<R, S, C, G> AppState<R, S, C, G> {
    /// Create application state.
    #[must_use]
    pub const fn new(
        orders: Arc<OrderService<R, S, C>>,
        payments: Arc<PaymentService<R, S, C, G>>,
        rate_limiter: FixedWindowRateLimiter<S>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            orders,
            payments,
            rate_limiter,
            shutdown,
        }
    }

    /// Token for one request, cancelled when the server shuts down.
    #[must_use]
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

impl<R, S, C, G> Clone for AppState<R, S, C, G> {
    fn clone(&self) -> Self {
        Self {
            orders: Arc::clone(&self.orders),
            payments: Arc::clone(&self.payments),
            rate_limiter: self.rate_limiter.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}
