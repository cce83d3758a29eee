//! `PostgreSQL` repository for the storefront order core.
//!
//! [`PostgresRepository`] implements every repository trait from
//! `storefront-core` on one connection pool. Order creation runs in a single
//! transaction: stock is decremented with a `stock_count >= quantity` guard,
//! consumed cart lines are moved out of `cart_items` into
//! `consumed_cart_items`, and the order with its items is inserted. Any
//! failure rolls the whole write back.
//!
//! Money is stored as integer cents, statuses and payment types as their
//! numeric codes.
//!
//! # Example
//!
//! ```no_run
//! use storefront_postgres::PostgresRepository;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repository =
//!     PostgresRepository::connect("postgres://localhost/storefront", 10, Duration::from_secs(5)).await?;
//! repository.migrate().await?;
//! # Ok(())
//! # }
//! ```

mod mapping;

use chrono::{DateTime, Utc};
use mapping::{order_from_row, to_i32, to_i64, u64_value, ItemRow};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use storefront_core::error::RepositoryError;
use storefront_core::repository::{
    AddressRepository, CartRepository, OrderRepository, ProductRepository, Result,
};
use storefront_core::types::{
    Address, AddressId, CartItem, CartItemId, NewOrder, Order, OrderId, OrderItem, OrderStatus,
    PageRequest, Product, ProductId, UserId,
};

const ORDER_COLUMNS: &str = "id, order_no, user_id, status, total_amount_cents, \
    payment_amount_cents, receiver_name, receiver_phone, address, payment_type, \
    payment_time, created_at, updated_at";

/// `PostgreSQL`-backed repository.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Open a connection pool.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be reached within `connect_timeout`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to connect to PostgreSQL: {e}")))?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    async fn load_items(&self, order_ids: &[i64]) -> Result<HashMap<i64, Vec<OrderItem>>> {
        let rows: Vec<ItemRow> = sqlx::query_as(
            r"
            SELECT order_id, product_id, product_name, product_image, price_cents, quantity
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, id
            ",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut items: HashMap<i64, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let order_id = row.order_id;
            items.entry(order_id).or_default().push(row.into_item()?);
        }
        Ok(items)
    }

    async fn load_order(&self, filter: &str, bind: OrderKey<'_>) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE {filter}");
        let query = sqlx::query(&sql);
        let query = match bind {
            OrderKey::Id(id) => query.bind(id),
            OrderKey::OrderNo(order_no) => query.bind(order_no),
        };
        let Some(row) = query.fetch_optional(&self.pool).await.map_err(db_error)? else {
            return Ok(None);
        };

        let id: i64 = row.try_get("id").map_err(db_error)?;
        let mut items = self.load_items(&[id]).await?;
        order_from_row(&row, items.remove(&id).unwrap_or_default()).map(Some)
    }
}

enum OrderKey<'a> {
    Id(i64),
    OrderNo(&'a str),
}

impl AddressRepository for PostgresRepository {
    async fn get_address_by_id(&self, id: AddressId) -> Result<Option<Address>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, name, phone, province, city, district, detail_addr
            FROM addresses
            WHERE id = $1
            ",
        )
        .bind(to_i64(id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(mapping::address_from_row).transpose()
    }
}

impl ProductRepository for PostgresRepository {
    async fn get_product_by_id(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            r"
            SELECT id, name, price_cents, stock_count, image_url, sale_count
            FROM products
            WHERE id = $1
            ",
        )
        .bind(to_i64(id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(mapping::product_from_row).transpose()
    }

    async fn update_product_stock(&self, id: ProductId, delta: i64) -> Result<()> {
        let product_id = to_i64(id.value())?;
        let result = sqlx::query(
            r"
            UPDATE products
            SET stock_count = stock_count + $2, updated_at = now()
            WHERE id = $1 AND stock_count + $2 >= 0
            ",
        )
        .bind(product_id)
        .bind(delta)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(product_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        if exists {
            Err(RepositoryError::InsufficientStock { product_id: id })
        } else {
            Err(RepositoryError::NotFound(format!("product {id}")))
        }
    }
}

impl CartRepository for PostgresRepository {
    async fn get_cart_items_by_ids(&self, ids: &[CartItemId]) -> Result<Vec<CartItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids
            .iter()
            .map(|id| to_i64(id.value()))
            .collect::<Result<Vec<_>>>()?;

        let rows = sqlx::query(
            r"
            SELECT id, user_id, product_id, quantity
            FROM cart_items
            WHERE id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(mapping::cart_item_from_row).collect()
    }

    async fn get_consumed_cart_items(&self, ids: &[CartItemId]) -> Result<Vec<CartItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids
            .iter()
            .map(|id| to_i64(id.value()))
            .collect::<Result<Vec<_>>>()?;

        let rows = sqlx::query(
            r"
            SELECT cart_item_id AS id, user_id, product_id, quantity
            FROM consumed_cart_items
            WHERE cart_item_id = ANY($1)
            ORDER BY cart_item_id
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(mapping::cart_item_from_row).collect()
    }

    async fn delete_cart_item(&self, id: CartItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(to_i64(id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

impl OrderRepository for PostgresRepository {
    async fn create_order(&self, new_order: NewOrder) -> Result<Order> {
        let user_id = to_i64(new_order.user_id.value())?;

        // Decrement in product id order so concurrent orders lock rows consistently
        let mut demand: BTreeMap<ProductId, u32> = BTreeMap::new();
        for item in &new_order.items {
            let entry = demand.entry(item.product_id).or_insert(0);
            *entry = entry.checked_add(item.quantity).ok_or_else(|| {
                RepositoryError::Database(format!("quantity overflow for product {}", item.product_id))
            })?;
        }

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        for (product_id, quantity) in &demand {
            let result = sqlx::query(
                r"
                UPDATE products
                SET stock_count = stock_count - $2,
                    sale_count = sale_count + $2,
                    updated_at = now()
                WHERE id = $1 AND stock_count >= $2
                ",
            )
            .bind(to_i64(product_id.value())?)
            .bind(to_i32(*quantity)?)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

            if result.rows_affected() == 0 {
                metrics::counter!("order_stock_conflicts_total").increment(1);
                tracing::warn!(
                    product_id = %product_id,
                    quantity = quantity,
                    "Guarded stock decrement matched no row, rolling back"
                );
                return Err(RepositoryError::InsufficientStock {
                    product_id: *product_id,
                });
            }
        }

        if !new_order.consumed_cart_items.is_empty() {
            let ids = new_order
                .consumed_cart_items
                .iter()
                .map(|line| to_i64(line.id.value()))
                .collect::<Result<Vec<_>>>()?;
            let deleted: Vec<i64> = sqlx::query_scalar(
                "DELETE FROM cart_items WHERE id = ANY($1) AND user_id = $2 RETURNING id",
            )
            .bind(&ids)
            .bind(user_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_error)?;

            let deleted: HashSet<i64> = deleted.into_iter().collect();
            if let Some(gone) = new_order
                .consumed_cart_items
                .iter()
                .zip(&ids)
                .find(|(_, id)| !deleted.contains(*id))
                .map(|(line, _)| line)
            {
                tracing::warn!(
                    cart_item_id = %gone.id,
                    product_id = %gone.product_id,
                    "Cart line left the cart before commit, rolling back"
                );
                return Err(RepositoryError::CartItemsUnavailable {
                    product_id: gone.product_id,
                });
            }
        }

        let order_id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO orders (
                order_no, user_id, status, total_amount_cents, payment_amount_cents,
                receiver_name, receiver_phone, address, payment_type, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING id
            ",
        )
        .bind(&new_order.order_no)
        .bind(user_id)
        .bind(i16::from(OrderStatus::Pending.code()))
        .bind(to_i64(new_order.total_amount.cents())?)
        .bind(to_i64(new_order.payment_amount.cents())?)
        .bind(&new_order.address.receiver_name)
        .bind(&new_order.address.receiver_phone)
        .bind(&new_order.address.address)
        .bind(i16::from(new_order.payment_type.code()))
        .bind(new_order.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        for item in &new_order.items {
            sqlx::query(
                r"
                INSERT INTO order_items (
                    order_id, product_id, product_name, product_image, price_cents, quantity
                ) VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(order_id)
            .bind(to_i64(item.product_id.value())?)
            .bind(&item.product_name)
            .bind(&item.product_image)
            .bind(to_i64(item.price.cents())?)
            .bind(to_i32(item.quantity)?)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        for line in &new_order.consumed_cart_items {
            sqlx::query(
                r"
                INSERT INTO consumed_cart_items (
                    cart_item_id, order_id, user_id, product_id, quantity
                ) VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(to_i64(line.id.value())?)
            .bind(order_id)
            .bind(user_id)
            .bind(to_i64(line.product_id.value())?)
            .bind(to_i32(line.quantity)?)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;

        tracing::debug!(order_id, order_no = %new_order.order_no, "Order persisted");

        Ok(Order {
            id: OrderId::new(u64_value(order_id)?),
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
        })
    }

    async fn get_order_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        self.load_order("id = $1", OrderKey::Id(to_i64(id.value())?))
            .await
    }

    async fn get_order_by_order_no(&self, order_no: &str) -> Result<Option<Order>> {
        self.load_order("order_no = $1", OrderKey::OrderNo(order_no))
            .await
    }

    async fn get_orders_by_user_id(
        &self,
        user_id: UserId,
        page: PageRequest,
        status: Option<OrderStatus>,
    ) -> Result<(Vec<Order>, u64)> {
        let user_id = to_i64(user_id.value())?;
        let status = status.map(|s| i16::from(s.code()));

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM orders
            WHERE user_id = $1 AND ($2::SMALLINT IS NULL OR status = $2)
            ",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE user_id = $1 AND ($2::SMALLINT IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(status)
            .bind(i64::from(page.page_size()))
            .bind(to_i64(page.offset())?)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        let ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_error)?;
        let mut items = self.load_items(&ids).await?;

        let orders = rows
            .iter()
            .zip(&ids)
            .map(|(row, id)| order_from_row(row, items.remove(id).unwrap_or_default()))
            .collect::<Result<Vec<_>>>()?;

        Ok((orders, u64_value(total)?))
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Order> {
        let order_id = to_i64(id.value())?;
        let result = sqlx::query(
            r"
            UPDATE orders
            SET status = $2,
                updated_at = $3,
                payment_time = CASE WHEN $4 THEN $3 ELSE payment_time END
            WHERE id = $1
            ",
        )
        .bind(order_id)
        .bind(i16::from(status.code()))
        .bind(at)
        .bind(status == OrderStatus::Paid)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("order {id}")));
        }

        self.get_order_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("order {id}")))
    }
}

fn db_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return RepositoryError::Conflict(db.message().to_string());
        }
    }
    RepositoryError::Database(e.to_string())
}
