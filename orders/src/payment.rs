//! Mock payment flow.
//!
//! Real gateway integration is out of scope. [`PaymentService`] hands out
//! `WeChat`-style payment parameters for a pending order and, when asked for the
//! payment status, confirms with a [`PaymentGateway`] and moves the order to
//! `Paid` through the normal status lifecycle.

use crate::service::OrderService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use storefront_core::environment::Clock;
use storefront_core::error::OrderError;
use storefront_core::repository::StorefrontRepository;
use storefront_core::store::KeyValueStore;
use storefront_core::types::{Money, OrderStatus, UserId};
use storefront_runtime::CancellationToken;
use thiserror::Error;

/// Payment gateway result
pub type GatewayResult<T> = Result<T, PaymentGatewayError>;

/// Payment gateway error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentGatewayError {
    /// The payer's provider refused the payment
    #[error("Payment declined: {reason}")]
    Declined {
        /// Decline reason
        reason: String,
    },
    /// The gateway did not answer in time
    #[error("Gateway timeout")]
    Timeout,
}

/// Confirmed payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTransaction {
    /// Order that was paid
    pub order_no: String,
    /// Gateway transaction id
    pub transaction_id: String,
    /// Amount captured
    pub amount: Money,
}

/// Payment provider abstraction.
pub trait PaymentGateway: Send + Sync {
    /// Ask the provider whether `order_no` has been paid.
    ///
    /// # Errors
    ///
    /// Returns error if the payment was declined or the gateway failed.
    fn confirm_payment(
        &self,
        order_no: &str,
        amount: Money,
    ) -> impl std::future::Future<Output = GatewayResult<PaymentTransaction>> + Send;
}

/// Mock gateway: confirms every payment unless told to decline.
#[derive(Debug, Clone, Default)]
pub struct MockPaymentGateway {
    latency: Duration,
    decline_reason: Option<String>,
}

impl MockPaymentGateway {
    /// Gateway that confirms immediately.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            decline_reason: None,
        }
    }

    /// Simulate network delay on every call.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Gateway that declines every payment.
    #[must_use]
    pub fn declining(reason: impl Into<String>) -> Self {
        Self {
            latency: Duration::ZERO,
            decline_reason: Some(reason.into()),
        }
    }
}

impl PaymentGateway for MockPaymentGateway {
    async fn confirm_payment(&self, order_no: &str, amount: Money) -> GatewayResult<PaymentTransaction> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(reason) = &self.decline_reason {
            return Err(PaymentGatewayError::Declined {
                reason: reason.clone(),
            });
        }

        let transaction_id = format!("mock_txn_{}", uuid::Uuid::new_v4().simple());
        tracing::info!(
            order_no = %order_no,
            amount = amount.cents(),
            transaction_id = %transaction_id,
            "Mock payment confirmed"
        );

        Ok(PaymentTransaction {
            order_no: order_no.to_string(),
            transaction_id,
            amount,
        })
    }
}

/// Parameters a `WeChat` mini-program needs to start a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WechatPayTicket {
    /// `"wx"` followed by the order number
    pub payment_id: String,
    /// Merchant application id
    pub app_id: String,
    /// Order creation time, unix seconds
    pub time_stamp: String,
    /// Random nonce
    pub nonce_str: String,
    /// Prepay package
    pub package: String,
    /// Signature algorithm
    pub sign_type: String,
    /// Signature
    pub pay_sign: String,
}

/// Result of a payment status check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    /// Order number
    pub order_no: String,
    /// Order status after the check
    pub status: OrderStatus,
    /// Whether the order is paid
    pub paid: bool,
}

/// Mock payment flow on top of the order service.
#[derive(Debug)]
pub struct PaymentService<R, S, C, G> {
    orders: Arc<OrderService<R, S, C>>,
    gateway: G,
    app_id: String,
}

impl<R, S, C, G> PaymentService<R, S, C, G>
where
    R: StorefrontRepository,
    S: KeyValueStore,
    C: Clock,
    G: PaymentGateway,
{
    /// Create a payment service for merchant `app_id`.
    #[must_use]
    pub fn new(orders: Arc<OrderService<R, S, C>>, gateway: G, app_id: impl Into<String>) -> Self {
        Self {
            orders,
            gateway,
            app_id: app_id.into(),
        }
    }

    /// Payment parameters for a pending order.
    ///
    /// # Errors
    ///
    /// - `OrderNotFound` if the order is missing or foreign
    /// - `InvalidRequest` if the order is no longer awaiting payment
    /// - `Storage` on repository failure
    pub async fn prepare(&self, order_no: &str, user: UserId) -> Result<WechatPayTicket, OrderError> {
        let order = self.orders.get_order_by_order_no(order_no, user).await?;
        if order.status != OrderStatus::Pending {
            return Err(OrderError::InvalidRequest(format!(
                "order {order_no} is {}, not awaiting payment",
                order.status
            )));
        }

        let nonce = uuid::Uuid::new_v4().simple().to_string();
        Ok(WechatPayTicket {
            payment_id: format!("wx{order_no}"),
            app_id: self.app_id.clone(),
            time_stamp: order.created_at.timestamp().to_string(),
            package: format!("prepay_id=wx{}", order.id),
            sign_type: "MD5".to_string(),
            pay_sign: format!("mock_sign_{nonce}"),
            nonce_str: nonce,
        })
    }

    /// Check payment and settle a pending order.
    ///
    /// A declined or failed confirmation leaves the order pending and reports
    /// `paid: false`.
    ///
    /// # Errors
    ///
    /// - `OrderNotFound` if the order is missing or foreign
    /// - `LockBusy` / `Cancelled` / `InvalidTransition` from the status update
    /// - `Storage` on store or repository failure
    pub async fn confirm(
        &self,
        order_no: &str,
        user: UserId,
        cancel: &CancellationToken,
    ) -> Result<PaymentStatus, OrderError> {
        let mut order = self.orders.get_order_by_order_no(order_no, user).await?;

        if order.status == OrderStatus::Pending {
            match self.gateway.confirm_payment(order_no, order.payment_amount).await {
                Ok(transaction) => {
                    tracing::info!(
                        order_no = %order_no,
                        transaction_id = %transaction.transaction_id,
                        "Payment confirmed, settling order"
                    );
                    order = self
                        .orders
                        .update_order_status(order.id, user, OrderStatus::Paid, cancel)
                        .await?;
                }
                Err(e) => {
                    tracing::warn!(order_no = %order_no, error = %e, "Payment not confirmed");
                }
            }
        }

        Ok(PaymentStatus {
            order_no: order.order_no,
            status: order.status,
            paid: matches!(
                order.status,
                OrderStatus::Paid | OrderStatus::Shipped | OrderStatus::Completed
            ),
        })
    }
}
