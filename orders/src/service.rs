//! The order orchestrator.
//!
//! [`OrderService`] turns a cart selection or a direct purchase into a
//! persisted order without overselling:
//!
//! 1. A distributed lock keyed by user and item set serializes duplicate
//!    submissions across processes.
//! 2. Inside the lock, ownership, prices and live stock are checked again.
//! 3. The repository writes the order, decrements stock with a
//!    `stock >= quantity` guard and consumes the cart lines in one
//!    transaction, which also covers races between different lock keys.
//!
//! Reads are cache-first. Status changes run under a per-order lock and
//! invalidate every cache entry that could show the old status.

use crate::config::OrderServiceConfig;
use crate::keys;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use storefront_core::environment::Clock;
use storefront_core::error::{ErrorCategory, OrderError};
use storefront_core::repository::StorefrontRepository;
use storefront_core::store::KeyValueStore;
use storefront_core::types::{
    CartItem, CartItemId, CreateOrderRequest, Money, NewOrder, Order, OrderDetail, OrderId, OrderIntent, OrderItem,
    OrderStatus, Page, PageRequest, ProductId, UserId,
};
use storefront_runtime::metrics::OrderMetrics;
use storefront_runtime::{CacheService, CancellationToken, LockManager, OrderNumberGenerator};

/// Injected dependencies of the order service.
#[derive(Debug)]
pub struct OrderEnvironment<R, S, C> {
    /// Relational persistence
    pub repository: Arc<R>,
    /// Shared key-value store for locks and caches
    pub store: Arc<S>,
    /// Time source for order numbers and timestamps
    pub clock: Arc<C>,
}

impl<R, S, C> Clone for OrderEnvironment<R, S, C> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

/// A priced line plus the stock level seen when it was priced.
struct PricedLine {
    item: OrderItem,
    available: u32,
    /// Cart line the item came from, consumed when the order is placed
    cart_item: Option<CartItem>,
}

/// Order orchestrator.
#[derive(Debug)]
pub struct OrderService<R, S, C> {
    repository: Arc<R>,
    locks: LockManager<S>,
    cache: CacheService<S>,
    order_numbers: OrderNumberGenerator<Arc<C>>,
    clock: Arc<C>,
    config: OrderServiceConfig,
}

impl<R, S, C> OrderService<R, S, C>
where
    R: StorefrontRepository,
    S: KeyValueStore,
    C: Clock,
{
    /// Create a service with the default configuration.
    #[must_use]
    pub fn new(env: OrderEnvironment<R, S, C>) -> Self {
        Self::with_config(env, OrderServiceConfig::default())
    }

    /// Create a service with explicit lock and cache lifetimes.
    #[must_use]
    pub fn with_config(env: OrderEnvironment<R, S, C>, config: OrderServiceConfig) -> Self {
        let config = config.normalized();
        Self {
            repository: env.repository,
            locks: LockManager::new(Arc::clone(&env.store)).with_retry(config.lock_retry),
            cache: CacheService::new(env.store),
            order_numbers: OrderNumberGenerator::new(Arc::clone(&env.clock)),
            clock: env.clock,
            config,
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &OrderServiceConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════

    /// Price an order without placing it.
    ///
    /// # Errors
    ///
    /// - `CartItemNotFound` if a cart line does not exist
    /// - `Unauthorized` if a cart line belongs to another user
    /// - `ProductNotFound` if a product does not exist
    /// - `OutOfStock` if a direct purchase exceeds live stock, or a cart line
    ///   was already checked out by this user
    /// - `Storage` on repository failure
    pub async fn get_order_detail(
        &self,
        user: UserId,
        intent: &OrderIntent,
    ) -> Result<OrderDetail, OrderError> {
        let lines = self.price_lines(user, intent).await?;
        if matches!(intent, OrderIntent::Direct { .. }) {
            Self::check_stock(&lines)?;
        }

        let items: Vec<OrderItem> = lines.into_iter().map(|line| line.item).collect();
        let total_amount = Self::total(&items)?;
        Ok(OrderDetail { items, total_amount })
    }

    /// Load an order visible to `user`.
    ///
    /// # Errors
    ///
    /// - `OrderNotFound` if the order does not exist or belongs to someone else
    /// - `Storage` on repository failure
    pub async fn get_order_by_id(&self, id: OrderId, user: UserId) -> Result<Order, OrderError> {
        if let Some(order) = self.cached_order(&keys::order(id), user).await {
            return Ok(order);
        }

        let order = self
            .repository
            .get_order_by_id(id)
            .await?
            .filter(|order| order.is_owned_by(user))
            .ok_or(OrderError::OrderNotFound)?;
        self.cache_order(&order).await;
        Ok(order)
    }

    /// Load an order visible to `user` by its order number.
    ///
    /// # Errors
    ///
    /// - `OrderNotFound` if the order does not exist or belongs to someone else
    /// - `Storage` on repository failure
    pub async fn get_order_by_order_no(
        &self,
        order_no: &str,
        user: UserId,
    ) -> Result<Order, OrderError> {
        if let Some(order) = self.cached_order(&keys::order_no(order_no), user).await {
            return Ok(order);
        }

        let order = self
            .repository
            .get_order_by_order_no(order_no)
            .await?
            .filter(|order| order.is_owned_by(user))
            .ok_or(OrderError::OrderNotFound)?;
        self.cache_order(&order).await;
        Ok(order)
    }

    /// One page of a user's orders, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on repository failure.
    pub async fn get_orders_by_user_id(
        &self,
        user: UserId,
        page: PageRequest,
        status: Option<OrderStatus>,
    ) -> Result<Page<Order>, OrderError> {
        let load = move || async move {
            let (orders, total) = self
                .repository
                .get_orders_by_user_id(user, page, status)
                .await?;
            Ok::<_, OrderError>(Page::new(orders, total, page))
        };

        let version = match self.cache.version(&keys::list_version(user)).await {
            Ok(version) => version,
            Err(e) => {
                tracing::warn!(user_id = %user, error = %e, "Listing cache unavailable");
                return load().await;
            }
        };

        let key = keys::list(user, &version, page, status);
        self.cache
            .obtain_object(&key, self.config.list_cache_ttl, load)
            .await
    }

    // ═══════════════════════════════════════════════════════════
    // Commands
    // ═══════════════════════════════════════════════════════════

    /// Place an order.
    ///
    /// At most one order results per call, stock is decremented exactly once
    /// on success, and the creation lock is always released.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for a malformed intent
    /// - `AddressNotFound` if the address is missing or foreign
    /// - `CartItemNotFound` / `Unauthorized` for missing or foreign cart lines
    /// - `ProductNotFound` if a product does not exist
    /// - `OutOfStock` if any product lacks stock, checked before any write, or
    ///   a cart line was consumed by a competing checkout
    /// - `LockBusy` if an identical submission holds the lock
    /// - `Cancelled` if `cancel` fires while waiting for the lock
    /// - `Storage` on store or repository failure
    pub async fn create_order(
        &self,
        user: UserId,
        request: &CreateOrderRequest,
        cancel: &CancellationToken,
    ) -> Result<Order, OrderError> {
        let started = Instant::now();
        let result = self.create_order_locked(user, request, cancel).await;

        match &result {
            Ok(order) => {
                OrderMetrics::record_created(started.elapsed());
                tracing::info!(
                    user_id = %user,
                    order_id = %order.id,
                    order_no = %order.order_no,
                    total = %order.total_amount,
                    "Order created"
                );
                self.cache_order(order).await;
                self.invalidate_listings(user).await;
            }
            Err(e) => {
                OrderMetrics::record_create_failure(failure_reason(e));
                tracing::debug!(user_id = %user, error = %e, "Order creation failed");
            }
        }
        result
    }

    /// Move an order to `status`.
    ///
    /// # Errors
    ///
    /// - `OrderNotFound` if the order does not exist or belongs to someone else
    /// - `InvalidTransition` if the lifecycle forbids the change
    /// - `LockBusy` / `Cancelled` while waiting for the status lock
    /// - `Storage` on store or repository failure
    pub async fn update_order_status(
        &self,
        id: OrderId,
        user: UserId,
        status: OrderStatus,
        cancel: &CancellationToken,
    ) -> Result<Order, OrderError> {
        // Authorization; also rejects unknown orders before taking the lock
        self.get_order_by_id(id, user).await?;

        let key = keys::status_lock(id);
        let updated = self
            .locks
            .with_lock(&key, self.config.status_lock_ttl, cancel, move || {
                self.apply_status(id, user, status)
            })
            .await?;

        OrderMetrics::record_status_change(status.as_str());
        tracing::info!(order_id = %id, user_id = %user, status = %status, "Order status updated");
        Ok(updated)
    }

    // ═══════════════════════════════════════════════════════════
    // Internals
    // ═══════════════════════════════════════════════════════════

    async fn create_order_locked(
        &self,
        user: UserId,
        request: &CreateOrderRequest,
        cancel: &CancellationToken,
    ) -> Result<Order, OrderError> {
        let intent = request.intent.intent()?;
        let key = keys::create_lock(user, &intent);
        let intent = &intent;

        self.locks
            .with_lock(&key, self.config.create_lock_ttl, cancel, move || {
                self.place_order(user, intent, request)
            })
            .await
    }

    async fn place_order(
        &self,
        user: UserId,
        intent: &OrderIntent,
        request: &CreateOrderRequest,
    ) -> Result<Order, OrderError> {
        let address = self
            .repository
            .get_address_by_id(request.address_id)
            .await?
            .filter(|address| address.user_id == user)
            .ok_or(OrderError::AddressNotFound)?;

        let lines = self.price_lines(user, intent).await?;
        Self::check_stock(&lines)?;

        let mut items = Vec::with_capacity(lines.len());
        let mut consumed_cart_items = Vec::new();
        for line in lines {
            items.push(line.item);
            consumed_cart_items.extend(line.cart_item);
        }
        let total_amount = Self::total(&items)?;

        let new_order = NewOrder {
            order_no: self.order_numbers.generate(user),
            user_id: user,
            total_amount,
            payment_amount: total_amount,
            address: address.snapshot(),
            payment_type: request.payment_type,
            items,
            consumed_cart_items,
            created_at: self.clock.now(),
        };

        Ok(self.repository.create_order(new_order).await?)
    }

    async fn apply_status(
        &self,
        id: OrderId,
        user: UserId,
        status: OrderStatus,
    ) -> Result<Order, OrderError> {
        // Re-read under the lock; the cached copy may predate another change
        let current = self
            .repository
            .get_order_by_id(id)
            .await?
            .filter(|order| order.is_owned_by(user))
            .ok_or(OrderError::OrderNotFound)?;

        if !current.status.can_transition_to(status) {
            return Err(OrderError::InvalidTransition {
                from: current.status,
                to: status,
            });
        }

        let updated = self
            .repository
            .update_order_status(id, status, self.clock.now())
            .await?;

        self.evict_order(&updated).await;
        self.invalidate_listings(user).await;
        Ok(updated)
    }

    async fn price_lines(
        &self,
        user: UserId,
        intent: &OrderIntent,
    ) -> Result<Vec<PricedLine>, OrderError> {
        match intent {
            OrderIntent::Cart { cart_item_ids } => {
                let mut ids = cart_item_ids.clone();
                ids.sort_unstable();
                ids.dedup();
                if ids.is_empty() {
                    return Err(OrderError::InvalidRequest("cart_ids is empty".to_string()));
                }

                let cart_items = self.repository.get_cart_items_by_ids(&ids).await?;
                // Missing lines first, so the answer for a foreign id never
                // depends on what else the request names
                if cart_items.len() != ids.len() {
                    return Err(self.missing_cart_lines(user, &ids, &cart_items).await);
                }
                if cart_items.iter().any(|item| item.user_id != user) {
                    return Err(OrderError::Unauthorized);
                }

                let mut lines = Vec::with_capacity(cart_items.len());
                for cart_item in cart_items {
                    let mut line = self.price_line(cart_item.product_id, cart_item.quantity).await?;
                    line.cart_item = Some(cart_item);
                    lines.push(line);
                }
                Ok(lines)
            }
            OrderIntent::Direct { product_id, quantity } => {
                if *quantity == 0 {
                    return Err(OrderError::InvalidRequest(
                        "quantity must be at least 1".to_string(),
                    ));
                }
                Ok(vec![self.price_line(*product_id, *quantity).await?])
            }
        }
    }

    async fn price_line(&self, product_id: ProductId, quantity: u32) -> Result<PricedLine, OrderError> {
        let product = self
            .repository
            .get_product_by_id(product_id)
            .await?
            .ok_or(OrderError::ProductNotFound(product_id))?;

        Ok(PricedLine {
            item: OrderItem::from_product(&product, quantity),
            available: product.stock,
            cart_item: None,
        })
    }

    /// Explains why requested cart lines are gone. A line this user already
    /// checked out means its stock went to another order; anything else is
    /// reported as not found.
    async fn missing_cart_lines(
        &self,
        user: UserId,
        requested: &[CartItemId],
        found: &[CartItem],
    ) -> OrderError {
        let missing: Vec<CartItemId> = requested
            .iter()
            .copied()
            .filter(|id| !found.iter().any(|item| item.id == *id))
            .collect();

        match self.repository.get_consumed_cart_items(&missing).await {
            Ok(consumed) => consumed
                .into_iter()
                .find(|line| line.user_id == user)
                .map_or(OrderError::CartItemNotFound, |line| {
                    tracing::debug!(
                        user_id = %user,
                        cart_item_id = %line.id,
                        product_id = %line.product_id,
                        "Cart line already checked out"
                    );
                    OrderError::OutOfStock {
                        product_id: line.product_id,
                    }
                }),
            Err(e) => e.into(),
        }
    }

    /// Demand is summed per product, so two lines of the same product are
    /// checked against its stock together.
    fn check_stock(lines: &[PricedLine]) -> Result<(), OrderError> {
        let mut demand: HashMap<ProductId, (u64, u32)> = HashMap::new();
        for line in lines {
            let entry = demand
                .entry(line.item.product_id)
                .or_insert((0, line.available));
            entry.0 += u64::from(line.item.quantity);
            entry.1 = entry.1.min(line.available);
        }

        let mut short: Vec<ProductId> = demand
            .into_iter()
            .filter(|(_, (wanted, available))| *wanted > u64::from(*available))
            .map(|(product_id, _)| product_id)
            .collect();
        short.sort_unstable();

        match short.first() {
            Some(&product_id) => Err(OrderError::OutOfStock { product_id }),
            None => Ok(()),
        }
    }

    fn total(items: &[OrderItem]) -> Result<Money, OrderError> {
        items
            .iter()
            .try_fold(Money::ZERO, |sum, item| {
                item.subtotal().and_then(|subtotal| sum.checked_add(subtotal))
            })
            .ok_or_else(|| OrderError::InvalidRequest("order total overflows".to_string()))
    }

    async fn cached_order(&self, key: &str, user: UserId) -> Option<Order> {
        match self.cache.get_object::<Order>(key).await {
            // Another user's cached order is a miss, never a leak
            Ok(Some(order)) if order.is_owned_by(user) => Some(order),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Order cache read failed");
                None
            }
        }
    }

    async fn cache_order(&self, order: &Order) {
        let ttl = self.config.order_cache_ttl;
        for key in [keys::order(order.id), keys::order_no(&order.order_no)] {
            if let Err(e) = self.cache.set_object(&key, order, ttl).await {
                tracing::warn!(key = %key, error = %e, "Order cache write failed");
            }
        }
    }

    async fn evict_order(&self, order: &Order) {
        for key in [keys::order(order.id), keys::order_no(&order.order_no)] {
            if let Err(e) = self.cache.delete(&key).await {
                tracing::warn!(key = %key, error = %e, "Order cache eviction failed");
            }
        }
    }

    async fn invalidate_listings(&self, user: UserId) {
        if let Err(e) = self
            .cache
            .rotate_version(&keys::list_version(user), self.config.list_version_ttl)
            .await
        {
            tracing::warn!(user_id = %user, error = %e, "Listing cache invalidation failed");
        }
    }
}

const fn failure_reason(error: &OrderError) -> &'static str {
    match error.category() {
        ErrorCategory::Validation => "validation",
        ErrorCategory::Authorization => "unauthorized",
        ErrorCategory::NotFound => "not_found",
        ErrorCategory::OutOfStock => "out_of_stock",
        ErrorCategory::LockBusy => "lock_busy",
        ErrorCategory::Cancelled => "cancelled",
        ErrorCategory::Storage => "storage",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use storefront_core::types::{IntentRequest, PaymentType};
    use storefront_testing::mocks::{test_clock, FixedClock};
    use storefront_testing::{fixtures, InMemoryRepository, InMemoryStore};

    type Service = OrderService<InMemoryRepository, InMemoryStore, FixedClock>;

    fn service() -> (Arc<InMemoryRepository>, Arc<InMemoryStore>, Service) {
        let repository = Arc::new(InMemoryRepository::new());
        let store = Arc::new(InMemoryStore::new());
        let service = OrderService::new(OrderEnvironment {
            repository: Arc::clone(&repository),
            store: Arc::clone(&store),
            clock: Arc::new(test_clock()),
        });
        (repository, store, service)
    }

    fn direct(product: u64, quantity: u32) -> OrderIntent {
        OrderIntent::Direct {
            product_id: ProductId::new(product),
            quantity,
        }
    }

    fn cart_request(ids: &[u64], address: u64) -> CreateOrderRequest {
        CreateOrderRequest {
            intent: IntentRequest {
                cart_ids: ids.iter().copied().map(CartItemId::new).collect(),
                ..IntentRequest::default()
            },
            address_id: storefront_core::types::AddressId::new(address),
            payment_type: PaymentType::Wechat,
        }
    }

    #[tokio::test]
    async fn detail_prices_cart_lines() {
        let (repo, _store, service) = service();
        repo.insert_product(fixtures::product(1, 1000, 5));
        repo.insert_product(fixtures::product(2, 250, 5));
        repo.insert_cart_item(fixtures::cart_item(10, 7, 1, 2));
        repo.insert_cart_item(fixtures::cart_item(11, 7, 2, 3));

        let detail = service
            .get_order_detail(
                UserId::new(7),
                &OrderIntent::Cart {
                    cart_item_ids: vec![CartItemId::new(10), CartItemId::new(11)],
                },
            )
            .await
            .unwrap();

        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.total_amount, Money::from_cents(2750));
    }

    #[tokio::test]
    async fn detail_rejects_foreign_and_missing_cart_lines_alike() {
        let (repo, _store, service) = service();
        repo.insert_product(fixtures::product(1, 1000, 5));
        repo.insert_cart_item(fixtures::cart_item(10, 8, 1, 1));

        let foreign = OrderIntent::Cart { cart_item_ids: vec![CartItemId::new(10)] };
        let foreign = service.get_order_detail(UserId::new(7), &foreign).await.unwrap_err();
        assert_eq!(foreign, OrderError::Unauthorized);

        let missing = OrderIntent::Cart { cart_item_ids: vec![CartItemId::new(99)] };
        let missing = service.get_order_detail(UserId::new(7), &missing).await.unwrap_err();
        assert_eq!(missing, OrderError::CartItemNotFound);

        assert_eq!(foreign.category(), missing.category());
    }

    #[tokio::test]
    async fn checked_out_cart_line_reports_out_of_stock_to_its_owner() {
        let (repo, _store, service) = service();
        repo.insert_product(fixtures::product(1, 1000, 5));
        repo.insert_address(fixtures::address(1, 7));
        repo.insert_cart_item(fixtures::cart_item(10, 7, 1, 2));
        let cancel = CancellationToken::new();

        service
            .create_order(UserId::new(7), &cart_request(&[10], 1), &cancel)
            .await
            .unwrap();

        assert_eq!(
            service
                .create_order(UserId::new(7), &cart_request(&[10], 1), &cancel)
                .await,
            Err(OrderError::OutOfStock { product_id: ProductId::new(1) })
        );
        // Someone else naming the consumed line learns nothing about it
        let line = OrderIntent::Cart { cart_item_ids: vec![CartItemId::new(10)] };
        assert_eq!(
            service.get_order_detail(UserId::new(8), &line).await,
            Err(OrderError::CartItemNotFound)
        );
        assert_eq!(repo.order_count(), 1);
        assert_eq!(repo.product(ProductId::new(1)).unwrap().stock, 3);
    }

    #[tokio::test]
    async fn detail_checks_direct_purchase_stock() {
        let (repo, _store, service) = service();
        repo.insert_product(fixtures::product(1, 1000, 1));

        assert_eq!(
            service.get_order_detail(UserId::new(7), &direct(1, 2)).await,
            Err(OrderError::OutOfStock { product_id: ProductId::new(1) })
        );
        assert_eq!(
            service.get_order_detail(UserId::new(7), &direct(2, 1)).await,
            Err(OrderError::ProductNotFound(ProductId::new(2)))
        );
        assert!(service.get_order_detail(UserId::new(7), &direct(1, 1)).await.is_ok());
    }

    #[test]
    fn stock_check_sums_lines_per_product() {
        let product = fixtures::product(1, 100, 3);
        let lines = vec![
            PricedLine { item: OrderItem::from_product(&product, 2), available: 3, cart_item: None },
            PricedLine { item: OrderItem::from_product(&product, 2), available: 3, cart_item: None },
        ];
        assert_eq!(
            Service::check_stock(&lines),
            Err(OrderError::OutOfStock { product_id: ProductId::new(1) })
        );
    }

    #[tokio::test]
    async fn create_rejects_foreign_address_without_writing() {
        let (repo, _store, service) = service();
        repo.insert_product(fixtures::product(1, 1000, 5));
        repo.insert_address(fixtures::address(3, 8));
        repo.insert_cart_item(fixtures::cart_item(10, 7, 1, 1));

        let result = service
            .create_order(UserId::new(7), &cart_request(&[10], 3), &CancellationToken::new())
            .await;

        assert_eq!(result, Err(OrderError::AddressNotFound));
        assert_eq!(repo.order_count(), 0);
        assert_eq!(repo.product(ProductId::new(1)).unwrap().stock, 5);
        assert!(repo.cart_item(CartItemId::new(10)).is_some());
    }

    #[tokio::test]
    async fn create_releases_lock_and_caches_order() {
        let (repo, store, service) = service();
        repo.insert_product(fixtures::product(1, 1000, 5));
        repo.insert_address(fixtures::address(3, 7));
        repo.insert_cart_item(fixtures::cart_item(10, 7, 1, 2));

        let order = service
            .create_order(UserId::new(7), &cart_request(&[10], 3), &CancellationToken::new())
            .await
            .unwrap();

        assert!(store.keys_with_prefix("lock:").is_empty());
        assert!(store.exists(&format!("cache:order:{}", order.id)).await.unwrap());
        assert!(store.exists(&format!("cache:order:no:{}", order.order_no)).await.unwrap());
        assert_eq!(order.address.address, "GuangdongShenzhenNanshanKeji Road 1");
        assert_eq!(order.created_at, test_clock().now());
    }

    #[tokio::test(start_paused = true)]
    async fn create_reports_busy_lock() {
        let (repo, store, service) = service();
        repo.insert_product(fixtures::product(1, 1000, 5));
        repo.insert_address(fixtures::address(3, 7));
        store
            .set("lock:order:create:user:7:product:1:qty:1", "someone", None)
            .await
            .unwrap();

        let request = CreateOrderRequest {
            intent: IntentRequest {
                product_id: Some(ProductId::new(1)),
                quantity: Some(1),
                ..IntentRequest::default()
            },
            address_id: storefront_core::types::AddressId::new(3),
            payment_type: PaymentType::Alipay,
        };

        let result = service
            .create_order(UserId::new(7), &request, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(OrderError::LockBusy { .. })));
        assert_eq!(repo.order_count(), 0);
    }

    #[tokio::test]
    async fn cached_order_is_invisible_to_other_users() {
        let (repo, _store, service) = service();
        repo.insert_product(fixtures::product(1, 1000, 5));
        repo.insert_address(fixtures::address(3, 7));
        repo.insert_cart_item(fixtures::cart_item(10, 7, 1, 1));
        let order = service
            .create_order(UserId::new(7), &cart_request(&[10], 3), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            service.get_order_by_id(order.id, UserId::new(8)).await,
            Err(OrderError::OrderNotFound)
        );
        assert_eq!(
            service.get_order_by_order_no(&order.order_no, UserId::new(8)).await,
            Err(OrderError::OrderNotFound)
        );
        assert_eq!(service.get_order_by_id(order.id, UserId::new(7)).await.unwrap(), order);
    }

    #[tokio::test]
    async fn reads_survive_cache_outage() {
        let (repo, store, service) = service();
        repo.insert_product(fixtures::product(1, 1000, 5));
        repo.insert_address(fixtures::address(3, 7));
        repo.insert_cart_item(fixtures::cart_item(10, 7, 1, 1));
        let order = service
            .create_order(UserId::new(7), &cart_request(&[10], 3), &CancellationToken::new())
            .await
            .unwrap();

        store.set_unavailable(true);
        assert_eq!(service.get_order_by_id(order.id, UserId::new(7)).await.unwrap().id, order.id);
        let page = service
            .get_orders_by_user_id(UserId::new(7), PageRequest::default(), None)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }
}
