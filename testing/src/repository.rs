//! In-memory implementation of every repository trait.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use storefront_core::error::RepositoryError;
use storefront_core::repository::{
    AddressRepository, CartRepository, OrderRepository, ProductRepository, Result,
};
use storefront_core::types::{
    Address, AddressId, CartItem, CartItemId, NewOrder, Order, OrderId, OrderStatus, PageRequest,
    Product, ProductId, UserId,
};

#[derive(Debug, Default)]
struct Tables {
    addresses: HashMap<AddressId, Address>,
    products: HashMap<ProductId, Product>,
    cart_items: HashMap<CartItemId, CartItem>,
    consumed_cart_items: HashMap<CartItemId, CartItem>,
    orders: BTreeMap<OrderId, Order>,
    next_order_id: u64,
}

/// In-memory repository for testing.
///
/// All tables sit behind one mutex, so [`OrderRepository::create_order`]
/// validates and applies every write as one unit, like a database
/// transaction.
///
/// [`InMemoryRepository::with_read_latency`] delays product and cart reads,
/// widening the window between the orchestrator's checks and its writes so
/// race tests can observe interleavings.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
    read_latency: Option<Duration>,
}

impl InMemoryRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every product and cart read by `latency`.
    #[must_use]
    pub fn with_read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = Some(latency);
        self
    }

    /// Seed an address.
    pub fn insert_address(&self, address: Address) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.addresses.insert(address.id, address);
        }
    }

    /// Seed a product.
    pub fn insert_product(&self, product: Product) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.products.insert(product.id, product);
        }
    }

    /// Seed a cart line.
    pub fn insert_cart_item(&self, item: CartItem) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.cart_items.insert(item.id, item);
        }
    }

    /// Current state of a product.
    #[must_use]
    pub fn product(&self, id: ProductId) -> Option<Product> {
        self.tables.lock().ok()?.products.get(&id).cloned()
    }

    /// Current state of a cart line.
    #[must_use]
    pub fn cart_item(&self, id: CartItemId) -> Option<CartItem> {
        self.tables.lock().ok()?.cart_items.get(&id).cloned()
    }

    /// Number of persisted orders.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.tables.lock().map_or(0, |t| t.orders.len())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.read_latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Database("Mutex lock failed".to_string()))
    }
}

impl AddressRepository for InMemoryRepository {
    async fn get_address_by_id(&self, id: AddressId) -> Result<Option<Address>> {
        Ok(self.tables()?.addresses.get(&id).cloned())
    }
}

impl ProductRepository for InMemoryRepository {
    async fn get_product_by_id(&self, id: ProductId) -> Result<Option<Product>> {
        self.simulate_latency().await;
        Ok(self.tables()?.products.get(&id).cloned())
    }

    async fn update_product_stock(&self, id: ProductId, delta: i64) -> Result<()> {
        let mut tables = self.tables()?;
        let product = tables
            .products
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("product {id}")))?;
        let next = i64::from(product.stock) + delta;
        if next < 0 {
            return Err(RepositoryError::InsufficientStock { product_id: id });
        }
        product.stock = u32::try_from(next)
            .map_err(|_| RepositoryError::Database(format!("stock overflow for product {id}")))?;
        Ok(())
    }
}

impl CartRepository for InMemoryRepository {
    async fn get_cart_items_by_ids(&self, ids: &[CartItemId]) -> Result<Vec<CartItem>> {
        self.simulate_latency().await;
        let tables = self.tables()?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.cart_items.get(id).cloned())
            .collect())
    }

    async fn get_consumed_cart_items(&self, ids: &[CartItemId]) -> Result<Vec<CartItem>> {
        let tables = self.tables()?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.consumed_cart_items.get(id).cloned())
            .collect())
    }

    async fn delete_cart_item(&self, id: CartItemId) -> Result<bool> {
        Ok(self.tables()?.cart_items.remove(&id).is_some())
    }
}

impl OrderRepository for InMemoryRepository {
    async fn create_order(&self, new_order: NewOrder) -> Result<Order> {
        let mut tables = self.tables()?;

        // Validate everything before the first write.
        let mut demand: HashMap<ProductId, u32> = HashMap::new();
        for item in &new_order.items {
            *demand.entry(item.product_id).or_insert(0) += item.quantity;
        }
        for (product_id, quantity) in &demand {
            let available = tables.products.get(product_id).map_or(0, |p| p.stock);
            if available < *quantity {
                return Err(RepositoryError::InsufficientStock { product_id: *product_id });
            }
        }
        // Same rule as the SQL delete: the line must still be in this user's cart
        if let Some(gone) = new_order.consumed_cart_items.iter().find(|line| {
            tables
                .cart_items
                .get(&line.id)
                .is_none_or(|current| current.user_id != new_order.user_id)
        }) {
            return Err(RepositoryError::CartItemsUnavailable {
                product_id: gone.product_id,
            });
        }
        if tables.orders.values().any(|o| o.order_no == new_order.order_no) {
            return Err(RepositoryError::Conflict(format!(
                "duplicate order number {}",
                new_order.order_no
            )));
        }

        for (product_id, quantity) in demand {
            if let Some(product) = tables.products.get_mut(&product_id) {
                product.stock -= quantity;
                product.sale_count = product.sale_count.saturating_add(quantity);
            }
        }
        for line in &new_order.consumed_cart_items {
            if let Some(item) = tables.cart_items.remove(&line.id) {
                tables.consumed_cart_items.insert(item.id, item);
            }
        }

        tables.next_order_id += 1;
        let order = Order {
            id: OrderId::new(tables.next_order_id),
            order_no: new_order.order_no,
            user_id: new_order.user_id,
            status: OrderStatus::Pending,
            total_amount: new_order.total_amount,
            payment_amount: new_order.payment_amount,
            address: new_order.address,
            payment_type: new_order.payment_type,
            payment_time: None,
            items: new_order.items,
            created_at: new_order.created_at,
            updated_at: new_order.created_at,
        };
        tables.orders.insert(order.id, order.clone());

        tracing::debug!(order_id = %order.id, order_no = %order.order_no, "In-memory order persisted");

        Ok(order)
    }

    async fn get_order_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables()?.orders.get(&id).cloned())
    }

    async fn get_order_by_order_no(&self, order_no: &str) -> Result<Option<Order>> {
        Ok(self
            .tables()?
            .orders
            .values()
            .find(|o| o.order_no == order_no)
            .cloned())
    }

    async fn get_orders_by_user_id(
        &self,
        user_id: UserId,
        page: PageRequest,
        status: Option<OrderStatus>,
    ) -> Result<(Vec<Order>, u64)> {
        let tables = self.tables()?;
        let mut matching: Vec<&Order> = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id && status.is_none_or(|s| o.status == s))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let orders = matching
            .into_iter()
            .skip(offset)
            .take(page.page_size() as usize)
            .cloned()
            .collect();
        Ok((orders, total))
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Order> {
        let mut tables = self.tables()?;
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("order {id}")))?;
        order.status = status;
        order.updated_at = at;
        if status == OrderStatus::Paid {
            order.payment_time = Some(at);
        }
        Ok(order.clone())
    }
}
