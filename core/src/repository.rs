//! Relational persistence traits.
//!
//! The orchestrator reads addresses, products and cart lines, and owns the
//! order tables. [`OrderRepository::create_order`] is the only multi-row write
//! and must be a single transaction.

use crate::error::RepositoryError;
use crate::types::{
    Address, AddressId, CartItem, CartItemId, NewOrder, Order, OrderId, OrderStatus, PageRequest,
    Product, ProductId, UserId,
};
use chrono::{DateTime, Utc};

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Shipping address lookups.
pub trait AddressRepository: Send + Sync {
    /// Load an address by id.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn get_address_by_id(
        &self,
        id: AddressId,
    ) -> impl std::future::Future<Output = Result<Option<Address>>> + Send;
}

/// Product lookups and stock adjustments.
pub trait ProductRepository: Send + Sync {
    /// Load a product with its live stock.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn get_product_by_id(
        &self,
        id: ProductId,
    ) -> impl std::future::Future<Output = Result<Option<Product>>> + Send;

    /// Add `delta` (possibly negative) to the product's stock.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::NotFound` if the product does not exist
    /// - `RepositoryError::InsufficientStock` if stock would drop below zero
    /// - `RepositoryError::Database` on query failure
    fn update_product_stock(
        &self,
        id: ProductId,
        delta: i64,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Shopping-cart lookups.
pub trait CartRepository: Send + Sync {
    /// Load the cart lines with the given ids. Missing ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn get_cart_items_by_ids(
        &self,
        ids: &[CartItemId],
    ) -> impl std::future::Future<Output = Result<Vec<CartItem>>> + Send;

    /// Load cart lines with the given ids that were already checked out into
    /// an order, as they were when consumed. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn get_consumed_cart_items(
        &self,
        ids: &[CartItemId],
    ) -> impl std::future::Future<Output = Result<Vec<CartItem>>> + Send;

    /// Delete one cart line. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn delete_cart_item(
        &self,
        id: CartItemId,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;
}

/// Order persistence.
pub trait OrderRepository: Send + Sync {
    /// Persist a new order in one transaction.
    ///
    /// Inserts the order and its items, decrements each product's stock with
    /// a `stock >= quantity` guard, and moves `consumed_cart_items` out of the
    /// cart into the order's consumed-line record. Nothing is written if any
    /// step fails.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::InsufficientStock` if a guarded decrement fails
    /// - `RepositoryError::CartItemsUnavailable` if a consumed cart line is gone
    ///   or no longer belongs to the order's user
    /// - `RepositoryError::Conflict` if the order number already exists
    /// - `RepositoryError::Database` on query failure
    fn create_order(
        &self,
        order: NewOrder,
    ) -> impl std::future::Future<Output = Result<Order>> + Send;

    /// Load an order with its items.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn get_order_by_id(
        &self,
        id: OrderId,
    ) -> impl std::future::Future<Output = Result<Option<Order>>> + Send;

    /// Load an order by its order number.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn get_order_by_order_no(
        &self,
        order_no: &str,
    ) -> impl std::future::Future<Output = Result<Option<Order>>> + Send;

    /// List a user's orders, newest first, with the total matching count.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn get_orders_by_user_id(
        &self,
        user_id: UserId,
        page: PageRequest,
        status: Option<OrderStatus>,
    ) -> impl std::future::Future<Output = Result<(Vec<Order>, u64)>> + Send;

    /// Write a new status. Moving to `Paid` also records the payment time.
    ///
    /// Transition rules are enforced by the caller.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::NotFound` if the order does not exist
    /// - `RepositoryError::Database` on query failure
    fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Order>> + Send;
}

/// Everything the order orchestrator reads and writes.
pub trait StorefrontRepository:
    AddressRepository + ProductRepository + CartRepository + OrderRepository
{
}

impl<T> StorefrontRepository for T where
    T: AddressRepository + ProductRepository + CartRepository + OrderRepository
{
}
