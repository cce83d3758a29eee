//! Domain types for the storefront order core.
//!
//! Value objects (ids, money, statuses), the records read from the relational
//! store (addresses, products, cart items), orders with their denormalized
//! snapshots, and the request shapes the orchestrator accepts.

use crate::error::OrderError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[doc = concat!("Creates a `", stringify!($name), "` from its numeric value")]
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the numeric value
            #[must_use]
            pub const fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Identifier of an authenticated user
    UserId
);
numeric_id!(
    /// Identifier of a persisted order
    OrderId
);
numeric_id!(
    /// Identifier of a catalog product
    ProductId
);
numeric_id!(
    /// Identifier of a shopping-cart line
    CartItemId
);
numeric_id!(
    /// Identifier of a shipping address
    AddressId
);

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Multiplies by a quantity with overflow checking
    #[must_use]
    pub const fn checked_mul(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Order status and payment type
// ============================================================================

/// Error returned when a persisted status or payment code is unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown code: {0}")]
pub struct UnknownCode(pub u8);

/// Lifecycle of an order.
///
/// ```text
/// Pending ──► Paid ──► Shipped ──► Completed
///    │          │
///    ▼          ▼
/// Cancelled  Refunded
/// ```
///
/// Serialized as its numeric code (1..=6), the representation stored in the
/// database and exchanged with clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OrderStatus {
    /// Created, awaiting payment
    Pending,
    /// Payment confirmed
    Paid,
    /// Handed to the carrier
    Shipped,
    /// Delivered and closed
    Completed,
    /// Cancelled before payment
    Cancelled,
    /// Refunded after payment
    Refunded,
}

impl OrderStatus {
    /// Numeric code of the status
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Pending => 1,
            Self::Paid => 2,
            Self::Shipped => 3,
            Self::Completed => 4,
            Self::Cancelled => 5,
            Self::Refunded => 6,
        }
    }

    /// Parses a numeric status code
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Pending),
            2 => Some(Self::Paid),
            3 => Some(Self::Shipped),
            4 => Some(Self::Completed),
            5 => Some(Self::Cancelled),
            6 => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Lowercase name, used in logs and metric labels
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Whether no further transition is possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Refunded)
    }

    /// Whether the state machine allows moving from `self` to `next`
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Cancelled)
                | (Self::Paid, Self::Shipped | Self::Refunded)
                | (Self::Shipped, Self::Completed)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for OrderStatus {
    type Error = UnknownCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(UnknownCode(code))
    }
}

impl From<OrderStatus> for u8 {
    fn from(status: OrderStatus) -> Self {
        status.code()
    }
}

/// How the customer pays for the order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PaymentType {
    /// `WeChat` Pay
    #[default]
    Wechat,
    /// Alipay
    Alipay,
}

impl PaymentType {
    /// Numeric code of the payment type
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Wechat => 1,
            Self::Alipay => 2,
        }
    }
}

impl TryFrom<u8> for PaymentType {
    type Error = UnknownCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Wechat),
            2 => Ok(Self::Alipay),
            other => Err(UnknownCode(other)),
        }
    }
}

impl From<PaymentType> for u8 {
    fn from(payment: PaymentType) -> Self {
        payment.code()
    }
}

// ============================================================================
// Relational records
// ============================================================================

/// Shipping address owned by a user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Address id
    pub id: AddressId,
    /// Owner
    pub user_id: UserId,
    /// Receiver name
    pub name: String,
    /// Receiver phone
    pub phone: String,
    /// Province
    pub province: String,
    /// City
    pub city: String,
    /// District
    pub district: String,
    /// Street-level detail
    pub detail: String,
}

impl Address {
    /// Province, city, district and detail joined into one line
    #[must_use]
    pub fn full_address(&self) -> String {
        format!("{}{}{}{}", self.province, self.city, self.district, self.detail)
    }

    /// Denormalized copy stored on the order
    #[must_use]
    pub fn snapshot(&self) -> AddressSnapshot {
        AddressSnapshot {
            receiver_name: self.name.clone(),
            receiver_phone: self.phone.clone(),
            address: self.full_address(),
        }
    }
}

/// Address as captured on an order at creation time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    /// Receiver name
    pub receiver_name: String,
    /// Receiver phone
    pub receiver_phone: String,
    /// Concatenated address line
    pub address: String,
}

/// Catalog product with its live stock level
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product id
    pub id: ProductId,
    /// Display name
    pub name: String,
    /// Unit price
    pub price: Money,
    /// Units available
    pub stock: u32,
    /// Image URL
    pub image_url: String,
    /// Units sold
    pub sale_count: u32,
}

/// One line of a user's shopping cart
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Cart line id
    pub id: CartItemId,
    /// Owner
    pub user_id: UserId,
    /// Product in the line
    pub product_id: ProductId,
    /// Units requested
    pub quantity: u32,
}

// ============================================================================
// Orders
// ============================================================================

/// Line item with the product snapshot taken when the order was priced
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Product id
    pub product_id: ProductId,
    /// Product name at order time
    pub product_name: String,
    /// Product image at order time
    pub product_image: String,
    /// Unit price at order time
    pub price: Money,
    /// Units ordered
    pub quantity: u32,
}

impl OrderItem {
    /// Builds a line item from the live product
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            product_name: product.name.clone(),
            product_image: product.image_url.clone(),
            price: product.price,
            quantity,
        }
    }

    /// `price × quantity`, `None` on overflow
    #[must_use]
    pub const fn subtotal(&self) -> Option<Money> {
        self.price.checked_mul(self.quantity)
    }
}

/// A persisted order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order id
    pub id: OrderId,
    /// Human-facing unique order number
    pub order_no: String,
    /// Owner
    pub user_id: UserId,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Sum of line subtotals
    pub total_amount: Money,
    /// Amount to be paid
    pub payment_amount: Money,
    /// Shipping address snapshot
    pub address: AddressSnapshot,
    /// Payment method
    pub payment_type: PaymentType,
    /// When the order became `Paid`
    pub payment_time: Option<DateTime<Utc>>,
    /// Line items
    pub items: Vec<OrderItem>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether `user` owns this order
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.user_id == user
    }
}

/// Everything the repository needs to persist a new order atomically.
///
/// `consumed_cart_items` are deleted in the same transaction that inserts the
/// order and decrements stock for each item, and are recorded against the
/// order so a later checkout of the same lines can be told apart from an
/// unknown id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOrder {
    /// Generated order number
    pub order_no: String,
    /// Owner
    pub user_id: UserId,
    /// Sum of line subtotals
    pub total_amount: Money,
    /// Amount to be paid
    pub payment_amount: Money,
    /// Shipping address snapshot
    pub address: AddressSnapshot,
    /// Payment method
    pub payment_type: PaymentType,
    /// Line items
    pub items: Vec<OrderItem>,
    /// Cart lines that become this order
    pub consumed_cart_items: Vec<CartItem>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Priced preview of an order that has not been placed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    /// Line items with live snapshots
    pub items: Vec<OrderItem>,
    /// Sum of line subtotals
    pub total_amount: Money,
}

// ============================================================================
// Requests
// ============================================================================

/// What the user wants to buy: a set of cart lines or one product directly
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderIntent {
    /// Check out cart lines (sorted, without duplicates)
    Cart {
        /// Cart lines to check out
        cart_item_ids: Vec<CartItemId>,
    },
    /// Buy a product without a cart
    Direct {
        /// Product to buy
        product_id: ProductId,
        /// Units to buy, at least 1
        quantity: u32,
    },
}

/// Wire shape of an order intent: cart ids, or a product id with a quantity
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRequest {
    /// Cart lines to check out
    #[serde(default)]
    pub cart_ids: Vec<CartItemId>,
    /// Product for a direct purchase
    #[serde(default)]
    pub product_id: Option<ProductId>,
    /// Quantity for a direct purchase
    #[serde(default)]
    pub quantity: Option<u32>,
}

impl IntentRequest {
    /// Validates the request into an [`OrderIntent`].
    ///
    /// Non-empty `cart_ids` win over a product id.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidRequest`] when neither shape is supplied
    /// or a direct purchase asks for zero units.
    pub fn intent(&self) -> Result<OrderIntent, OrderError> {
        if !self.cart_ids.is_empty() {
            let mut cart_item_ids = self.cart_ids.clone();
            cart_item_ids.sort_unstable();
            cart_item_ids.dedup();
            return Ok(OrderIntent::Cart { cart_item_ids });
        }

        match (self.product_id, self.quantity) {
            (Some(product_id), Some(quantity)) if quantity >= 1 => {
                Ok(OrderIntent::Direct { product_id, quantity })
            }
            (Some(_), _) => Err(OrderError::InvalidRequest(
                "quantity must be at least 1".to_string(),
            )),
            (None, _) => Err(OrderError::InvalidRequest(
                "either cart_ids or product_id is required".to_string(),
            )),
        }
    }
}

/// Request to place an order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    /// What to buy
    #[serde(flatten)]
    pub intent: IntentRequest,
    /// Shipping address
    pub address_id: AddressId,
    /// Payment method
    #[serde(default)]
    pub payment_type: PaymentType,
}

// ============================================================================
// Pagination
// ============================================================================

/// Largest page a caller may request
pub const MAX_PAGE_SIZE: u32 = 50;

/// Page size used when the caller gives none or an invalid one
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// A validated page request: `page >= 1`, `1 <= page_size <= 50`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// Creates a page request.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidRequest`] when the page is 0 or the size
    /// is outside `1..=50`.
    pub fn new(page: u32, page_size: u32) -> Result<Self, OrderError> {
        if page < 1 {
            return Err(OrderError::InvalidRequest("page must be at least 1".to_string()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(OrderError::InvalidRequest(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self { page, page_size })
    }

    /// Applies defaults instead of rejecting: page 1, size 10.
    #[must_use]
    pub fn clamped(page: Option<u32>, page_size: Option<u32>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let page_size = page_size
            .filter(|s| (1..=MAX_PAGE_SIZE).contains(s))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self { page, page_size }
    }

    /// 1-based page number
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Items per page
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Rows to skip
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::clamped(None, None)
    }
}

/// One page of results
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Total matching rows
    pub total: u64,
    /// Items per page
    pub page_size: u32,
    /// 1-based page number
    pub current_page: u32,
    /// `ceil(total / page_size)`
    pub total_pages: u64,
    /// Rows on this page
    pub data: Vec<T>,
}

impl<T> Page<T> {
    /// Assembles a page from the rows and the total count
    #[must_use]
    pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Self {
        let size = u64::from(request.page_size());
        Self {
            total,
            page_size: request.page_size(),
            current_page: request.page(),
            total_pages: total.div_ceil(size),
            data,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn money_formats_as_decimal() {
        assert_eq!(Money::from_cents(2000).to_string(), "20.00");
        assert_eq!(Money::from_cents(1005).to_string(), "10.05");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn money_mul_detects_overflow() {
        assert_eq!(Money::from_cents(1000).checked_mul(2), Some(Money::from_cents(2000)));
        assert_eq!(Money::from_cents(u64::MAX).checked_mul(2), None);
    }

    #[test]
    fn status_transitions_follow_lifecycle() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Refunded));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Completed));

        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));

        let every = [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ];
        for terminal in [OrderStatus::Completed, OrderStatus::Cancelled, OrderStatus::Refunded] {
            assert!(terminal.is_terminal());
            for next in every {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn status_serializes_as_code() {
        assert_eq!(serde_json::to_string(&OrderStatus::Paid).unwrap(), "2");
        let parsed: OrderStatus = serde_json::from_str("6").unwrap();
        assert_eq!(parsed, OrderStatus::Refunded);
        assert!(serde_json::from_str::<OrderStatus>("9").is_err());
    }

    #[test]
    fn address_concatenates_parts() {
        let address = Address {
            id: AddressId::new(1),
            user_id: UserId::new(7),
            name: "Li Lei".to_string(),
            phone: "13800000000".to_string(),
            province: "Zhejiang".to_string(),
            city: "Hangzhou".to_string(),
            district: "Xihu".to_string(),
            detail: "No. 1 Road".to_string(),
        };
        assert_eq!(address.full_address(), "ZhejiangHangzhouXihuNo. 1 Road");
        assert_eq!(address.snapshot().receiver_name, "Li Lei");
    }

    #[test]
    fn intent_prefers_cart_and_normalizes_ids() {
        let request = IntentRequest {
            cart_ids: vec![CartItemId::new(3), CartItemId::new(1), CartItemId::new(3)],
            product_id: Some(ProductId::new(9)),
            quantity: Some(1),
        };
        assert_eq!(
            request.intent().unwrap(),
            OrderIntent::Cart {
                cart_item_ids: vec![CartItemId::new(1), CartItemId::new(3)]
            }
        );
    }

    #[test]
    fn intent_rejects_missing_shape_and_zero_quantity() {
        assert!(matches!(
            IntentRequest::default().intent(),
            Err(OrderError::InvalidRequest(_))
        ));
        let zero = IntentRequest {
            product_id: Some(ProductId::new(1)),
            quantity: Some(0),
            ..IntentRequest::default()
        };
        assert!(matches!(zero.intent(), Err(OrderError::InvalidRequest(_))));
    }

    #[test]
    fn create_request_accepts_flat_json() {
        let request: CreateOrderRequest =
            serde_json::from_str(r#"{"product_id": 4, "quantity": 2, "address_id": 8}"#).unwrap();
        assert_eq!(request.address_id, AddressId::new(8));
        assert_eq!(request.payment_type, PaymentType::Wechat);
        assert_eq!(
            request.intent.intent().unwrap(),
            OrderIntent::Direct { product_id: ProductId::new(4), quantity: 2 }
        );
    }

    #[test]
    fn page_request_validates_and_clamps() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 51).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert_eq!(PageRequest::new(3, 20).unwrap().offset(), 40);

        let clamped = PageRequest::clamped(Some(0), Some(100));
        assert_eq!((clamped.page(), clamped.page_size()), (1, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn page_counts_total_pages() {
        let request = PageRequest::new(1, 10).unwrap();
        assert_eq!(Page::new(Vec::<u8>::new(), 0, request).total_pages, 0);
        assert_eq!(Page::new(Vec::<u8>::new(), 10, request).total_pages, 1);
        assert_eq!(Page::new(Vec::<u8>::new(), 21, request).total_pages, 3);
    }

    proptest! {
        #[test]
        fn checked_add_matches_integer_sum(a in 0u64..u64::MAX / 2, b in 0u64..u64::MAX / 2) {
            let sum = Money::from_cents(a).checked_add(Money::from_cents(b)).unwrap();
            prop_assert_eq!(sum.cents(), a + b);
        }

        #[test]
        fn subtotal_is_price_times_quantity(price in 0u64..1_000_000, quantity in 0u32..10_000) {
            let item = OrderItem {
                product_id: ProductId::new(1),
                product_name: String::new(),
                product_image: String::new(),
                price: Money::from_cents(price),
                quantity,
            };
            prop_assert_eq!(item.subtotal().unwrap().cents(), price * u64::from(quantity));
        }
    }
}
