//! # Storefront Orders
//!
//! The order-creation and concurrency-control core.
//!
//! [`OrderService`] coordinates distributed locks, live stock checks,
//! transactional persistence and cache invalidation so that concurrent
//! submissions never oversell inventory or create duplicate orders.
//! [`payment::PaymentService`] layers a mock payment flow on top.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use storefront_core::environment::SystemClock;
//! use storefront_core::types::{CreateOrderRequest, UserId};
//! use storefront_orders::{OrderEnvironment, OrderService};
//! use storefront_runtime::CancellationToken;
//! use storefront_testing::{InMemoryRepository, InMemoryStore};
//!
//! # async fn example(request: CreateOrderRequest) -> Result<(), storefront_core::error::OrderError> {
//! let service = OrderService::new(OrderEnvironment {
//!     repository: Arc::new(InMemoryRepository::new()),
//!     store: Arc::new(InMemoryStore::new()),
//!     clock: Arc::new(SystemClock),
//! });
//!
//! let order = service
//!     .create_order(UserId::new(7), &request, &CancellationToken::new())
//!     .await?;
//! println!("placed {}", order.order_no);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod keys;
pub mod payment;
pub mod service;

pub use config::OrderServiceConfig;
pub use payment::{MockPaymentGateway, PaymentGateway, PaymentService, PaymentStatus, WechatPayTicket};
pub use service::{OrderEnvironment, OrderService};
