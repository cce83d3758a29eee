//! Error types for the storefront order core.
//!
//! One enum per layer: [`StoreError`] for the shared key-value store,
//! [`RepositoryError`] for relational persistence, and [`OrderError`] for
//! everything the order orchestrator reports to its callers.

use crate::types::{OrderStatus, ProductId};
use thiserror::Error;

/// Failure talking to the shared key-value store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Store connection error: {0}")]
    Connection(String),

    /// The store rejected or failed a command.
    #[error("Store command error: {0}")]
    Command(String),

    /// A value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Failure in the relational repository.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The row to update does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A conditional stock decrement matched no row.
    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock {
        /// Product that ran out
        product_id: ProductId,
    },

    /// A cart line to consume was already gone, usually checked out by a
    /// competing order.
    #[error("Cart item for product {product_id} is no longer available")]
    CartItemsUnavailable {
        /// Product of the first missing line
        product_id: ProductId,
    },

    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other database failure.
    #[error("Database error: {0}")]
    Database(String),
}

/// Coarse classification used by boundaries to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed input or illegal state transition
    Validation,
    /// Caller may not act on the resource
    Authorization,
    /// Resource missing or not visible to the caller
    NotFound,
    /// Inventory exhausted
    OutOfStock,
    /// Lock held by someone else after all retries
    LockBusy,
    /// Caller gave up
    Cancelled,
    /// Infrastructure failure
    Storage,
}

/// Errors surfaced by the order orchestrator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    // ═══════════════════════════════════════════════════════════
    // Validation
    // ═══════════════════════════════════════════════════════════

    /// The request is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The status change is not allowed by the order lifecycle.
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
    },

    // ═══════════════════════════════════════════════════════════
    // Authorization
    // ═══════════════════════════════════════════════════════════

    /// A referenced cart item belongs to another user.
    #[error("Unauthorized")]
    Unauthorized,

    /// A referenced cart item does not exist. Reported in the same category
    /// as [`OrderError::Unauthorized`] so foreign cart ids cannot be probed.
    #[error("Cart item not found")]
    CartItemNotFound,

    // ═══════════════════════════════════════════════════════════
    // Not found
    // ═══════════════════════════════════════════════════════════

    /// Address missing or owned by someone else.
    #[error("Address not found")]
    AddressNotFound,

    /// Order missing or owned by someone else.
    #[error("Order not found")]
    OrderNotFound,

    /// Product missing.
    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    // ═══════════════════════════════════════════════════════════
    // Inventory and coordination
    // ═══════════════════════════════════════════════════════════

    /// Not enough stock to satisfy the order.
    #[error("Product {product_id} is out of stock")]
    OutOfStock {
        /// Product that ran out
        product_id: ProductId,
    },

    /// The lock protecting the operation stayed busy.
    #[error("Operation in progress, please retry: {key}")]
    LockBusy {
        /// Lock key
        key: String,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    // ═══════════════════════════════════════════════════════════
    // Infrastructure
    // ═══════════════════════════════════════════════════════════

    /// Store or repository failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl OrderError {
    /// Category used to map the error at a boundary
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest(_) | Self::InvalidTransition { .. } => ErrorCategory::Validation,
            Self::Unauthorized | Self::CartItemNotFound => ErrorCategory::Authorization,
            Self::AddressNotFound | Self::OrderNotFound | Self::ProductNotFound(_) => {
                ErrorCategory::NotFound
            }
            Self::OutOfStock { .. } => ErrorCategory::OutOfStock,
            Self::LockBusy { .. } => ErrorCategory::LockBusy,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Storage(_) => ErrorCategory::Storage,
        }
    }
}

impl From<RepositoryError> for OrderError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::InsufficientStock { product_id }
            | RepositoryError::CartItemsUnavailable { product_id } => Self::OutOfStock { product_id },
            RepositoryError::NotFound(_) => Self::OrderNotFound,
            RepositoryError::Conflict(msg) | RepositoryError::Database(msg) => Self::Storage(msg),
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(e: StoreError) -> Self {
        Self::Storage(e.to_string())
    }
}
