//! Row decoding and integer conversions between domain and SQL types.

use sqlx::postgres::PgRow;
use sqlx::Row;
use storefront_core::error::RepositoryError;
use storefront_core::repository::Result;
use storefront_core::types::{
    Address, AddressId, AddressSnapshot, CartItem, CartItemId, Money, Order, OrderId, OrderItem,
    OrderStatus, PaymentType, Product, ProductId, UserId,
};

/// An `order_items` row.
#[derive(Debug, sqlx::FromRow)]
pub struct ItemRow {
    pub order_id: i64,
    product_id: i64,
    product_name: String,
    product_image: String,
    price_cents: i64,
    quantity: i32,
}

impl ItemRow {
    pub fn into_item(self) -> Result<OrderItem> {
        Ok(OrderItem {
            product_id: ProductId::new(u64_value(self.product_id)?),
            product_name: self.product_name,
            product_image: self.product_image,
            price: Money::from_cents(u64_value(self.price_cents)?),
            quantity: u32_value(self.quantity)?,
        })
    }
}

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| RepositoryError::Database(format!("{value} does not fit in BIGINT")))
}

pub fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::Database(format!("{value} does not fit in INTEGER")))
}

pub fn u64_value(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| RepositoryError::Database(format!("unexpected negative value {value}")))
}

fn u32_value(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| RepositoryError::Database(format!("unexpected negative value {value}")))
}

fn code(value: i16) -> Result<u8> {
    u8::try_from(value).map_err(|_| RepositoryError::Database(format!("invalid code {value}")))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| RepositoryError::Database(format!("column {column}: {e}")))
}

pub fn address_from_row(row: &PgRow) -> Result<Address> {
    Ok(Address {
        id: AddressId::new(u64_value(get(row, "id")?)?),
        user_id: UserId::new(u64_value(get(row, "user_id")?)?),
        name: get(row, "name")?,
        phone: get(row, "phone")?,
        province: get(row, "province")?,
        city: get(row, "city")?,
        district: get(row, "district")?,
        detail: get(row, "detail_addr")?,
    })
}

pub fn product_from_row(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(u64_value(get(row, "id")?)?),
        name: get(row, "name")?,
        price: Money::from_cents(u64_value(get(row, "price_cents")?)?),
        stock: u32_value(get(row, "stock_count")?)?,
        image_url: get(row, "image_url")?,
        sale_count: u32_value(get(row, "sale_count")?)?,
    })
}

pub fn cart_item_from_row(row: &PgRow) -> Result<CartItem> {
    Ok(CartItem {
        id: CartItemId::new(u64_value(get(row, "id")?)?),
        user_id: UserId::new(u64_value(get(row, "user_id")?)?),
        product_id: ProductId::new(u64_value(get(row, "product_id")?)?),
        quantity: u32_value(get(row, "quantity")?)?,
    })
}

pub fn order_from_row(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
    let status = code(get(row, "status")?)?;
    let payment_type = code(get(row, "payment_type")?)?;

    Ok(Order {
        id: OrderId::new(u64_value(get(row, "id")?)?),
        order_no: get(row, "order_no")?,
        user_id: UserId::new(u64_value(get(row, "user_id")?)?),
        status: OrderStatus::from_code(status)
            .ok_or_else(|| RepositoryError::Database(format!("unknown order status {status}")))?,
        total_amount: Money::from_cents(u64_value(get(row, "total_amount_cents")?)?),
        payment_amount: Money::from_cents(u64_value(get(row, "payment_amount_cents")?)?),
        address: AddressSnapshot {
            receiver_name: get(row, "receiver_name")?,
            receiver_phone: get(row, "receiver_phone")?,
            address: get(row, "address")?,
        },
        payment_type: PaymentType::try_from(payment_type)
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        payment_time: get(row, "payment_time")?,
        items,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}
