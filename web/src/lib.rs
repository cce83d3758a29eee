//! Axum HTTP adapter for the storefront order core.
//!
//! Handlers translate requests into [`storefront_orders::OrderService`] calls
//! and map results into the `{code, message, data}` envelope.
//!
//! # Request Flow
//!
//! 1. **Request id** assigned and recorded on the tracing span
//! 2. **Rate limit** checked per client IP (`/api` only)
//! 3. **Caller identity** read from `X-User-Id`
//! 4. **Service call** with a cancellation token tied to server shutdown
//! 5. **Envelope**: success as `code: 200`, errors by [`storefront_core::error::ErrorCategory`]
//!
//! # Example
//!
//! ```ignore
//! use storefront_web::{build_router, AppState};
//!
//! let state = AppState::new(orders, payments, rate_limiter, shutdown.clone());
//! let app = build_router(state);
//! axum::serve(listener, app).await?;
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{AuthenticatedUser, ClientIp, USER_ID_HEADER};
pub use middleware::{rate_limit, request_id_layer, RequestId, REQUEST_ID_HEADER};
pub use response::ApiResponse;
pub use routes::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
