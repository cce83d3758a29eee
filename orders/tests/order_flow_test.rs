//! End-to-end order flows against the in-memory repository and store.
//!
//! Covers checkout from a cart, the status lifecycle, and cache coherence of
//! single-order reads and listings after writes.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use std::sync::Arc;
use storefront_core::error::OrderError;
use storefront_core::store::KeyValueStore;
use storefront_core::types::{
    AddressId, CartItemId, CreateOrderRequest, IntentRequest, Money, OrderStatus, PageRequest,
    PaymentType, ProductId, UserId,
};
use storefront_orders::{MockPaymentGateway, OrderEnvironment, OrderService, PaymentService};
use storefront_runtime::CancellationToken;
use storefront_testing::mocks::{test_clock, FixedClock};
use storefront_testing::{fixtures, InMemoryRepository, InMemoryStore};

type Service = OrderService<InMemoryRepository, InMemoryStore, FixedClock>;

struct Shop {
    repository: Arc<InMemoryRepository>,
    store: Arc<InMemoryStore>,
    orders: Arc<Service>,
}

fn shop() -> Shop {
    storefront_testing::init_tracing();
    let repository = Arc::new(InMemoryRepository::new());
    let store = Arc::new(InMemoryStore::new());
    let orders = Arc::new(OrderService::new(OrderEnvironment {
        repository: Arc::clone(&repository),
        store: Arc::clone(&store),
        clock: Arc::new(test_clock()),
    }));
    Shop {
        repository,
        store,
        orders,
    }
}

fn buy_now(product: u64, quantity: u32, address: u64) -> CreateOrderRequest {
    CreateOrderRequest {
        intent: IntentRequest {
            product_id: Some(ProductId::new(product)),
            quantity: Some(quantity),
            ..IntentRequest::default()
        },
        address_id: AddressId::new(address),
        payment_type: PaymentType::Wechat,
    }
}

/// Test: checking out a cart line.
///
/// Product priced 10.00 with stock 5, cart line of quantity 2.
#[tokio::test]
async fn test_cart_checkout_prices_decrements_and_consumes() {
    let shop = shop();
    shop.repository.insert_product(fixtures::product(1, 1000, 5));
    shop.repository.insert_address(fixtures::address(1, 7));
    shop.repository.insert_cart_item(fixtures::cart_item(10, 7, 1, 2));

    let request = CreateOrderRequest {
        intent: IntentRequest {
            cart_ids: vec![CartItemId::new(10)],
            ..IntentRequest::default()
        },
        address_id: AddressId::new(1),
        payment_type: PaymentType::Alipay,
    };
    let order = shop
        .orders
        .create_order(UserId::new(7), &request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, Money::from_cents(2000));
    assert_eq!(order.payment_amount, order.total_amount);
    assert_eq!(order.payment_type, PaymentType::Alipay);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 2);
    assert_eq!(order.items[0].price, Money::from_cents(1000));
    assert_eq!(order.address.receiver_name, "Zhang San");
    assert!(order.order_no.starts_with("ORD20250101000000"));
    assert_eq!(order.order_no.len(), 25);

    let product = shop.repository.product(ProductId::new(1)).unwrap();
    assert_eq!(product.stock, 3);
    assert!(shop.repository.cart_item(CartItemId::new(10)).is_none());
    assert!(shop.store.keys_with_prefix("lock:").is_empty());
}

/// Test: a rejected order leaves no trace.
#[tokio::test]
async fn test_out_of_stock_order_writes_nothing() {
    let shop = shop();
    shop.repository.insert_product(fixtures::product(1, 1000, 1));
    shop.repository.insert_address(fixtures::address(1, 7));

    let result = shop
        .orders
        .create_order(UserId::new(7), &buy_now(1, 2, 1), &CancellationToken::new())
        .await;

    assert_eq!(
        result,
        Err(OrderError::OutOfStock {
            product_id: ProductId::new(1)
        })
    );
    assert_eq!(shop.repository.order_count(), 0);
    assert_eq!(shop.repository.product(ProductId::new(1)).unwrap().stock, 1);
    assert!(shop.store.keys_with_prefix("lock:").is_empty());
}

/// Test: malformed intents are rejected before any lock is taken.
#[tokio::test]
async fn test_malformed_intent_is_invalid_request() {
    let shop = shop();
    shop.repository.insert_address(fixtures::address(1, 7));

    let empty = CreateOrderRequest {
        intent: IntentRequest::default(),
        address_id: AddressId::new(1),
        payment_type: PaymentType::Wechat,
    };
    let zero = buy_now(1, 0, 1);

    for request in [empty, zero] {
        let result = shop
            .orders
            .create_order(UserId::new(7), &request, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(OrderError::InvalidRequest(_))));
    }
    assert!(shop.store.is_empty());
}

/// Test: status lifecycle through payment, shipping and completion.
#[tokio::test]
async fn test_status_lifecycle_is_observable_and_enforced() {
    let shop = shop();
    shop.repository.insert_product(fixtures::product(1, 1000, 5));
    shop.repository.insert_address(fixtures::address(1, 7));
    let user = UserId::new(7);
    let cancel = CancellationToken::new();

    let order = shop
        .orders
        .create_order(user, &buy_now(1, 1, 1), &cancel)
        .await
        .unwrap();

    // Warm the cache with the pending copy
    assert_eq!(
        shop.orders.get_order_by_id(order.id, user).await.unwrap().status,
        OrderStatus::Pending
    );

    let paid = shop
        .orders
        .update_order_status(order.id, user, OrderStatus::Paid, &cancel)
        .await
        .unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);
    assert!(paid.payment_time.is_some());

    // Reads after the update never see the stale status
    assert_eq!(
        shop.orders.get_order_by_id(order.id, user).await.unwrap().status,
        OrderStatus::Paid
    );
    assert_eq!(
        shop.orders
            .get_order_by_order_no(&order.order_no, user)
            .await
            .unwrap()
            .status,
        OrderStatus::Paid
    );

    assert_eq!(
        shop.orders
            .update_order_status(order.id, user, OrderStatus::Pending, &cancel)
            .await,
        Err(OrderError::InvalidTransition {
            from: OrderStatus::Paid,
            to: OrderStatus::Pending
        })
    );

    for next in [OrderStatus::Shipped, OrderStatus::Completed] {
        shop.orders
            .update_order_status(order.id, user, next, &cancel)
            .await
            .unwrap();
    }

    // Completed is terminal
    assert!(matches!(
        shop.orders
            .update_order_status(order.id, user, OrderStatus::Refunded, &cancel)
            .await,
        Err(OrderError::InvalidTransition { .. })
    ));
    assert!(shop.store.keys_with_prefix("lock:").is_empty());
}

/// Test: another user can neither read nor change an order.
#[tokio::test]
async fn test_foreign_status_update_is_not_found() {
    let shop = shop();
    shop.repository.insert_product(fixtures::product(1, 1000, 5));
    shop.repository.insert_address(fixtures::address(1, 7));

    let order = shop
        .orders
        .create_order(UserId::new(7), &buy_now(1, 1, 1), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        shop.orders
            .update_order_status(order.id, UserId::new(8), OrderStatus::Cancelled, &CancellationToken::new())
            .await,
        Err(OrderError::OrderNotFound)
    );
    assert_eq!(
        shop.orders.get_order_by_id(order.id, UserId::new(7)).await.unwrap().status,
        OrderStatus::Pending
    );
}

/// Test: cached listings are invalidated by creates and status changes.
#[tokio::test]
async fn test_listing_cache_follows_writes() {
    let shop = shop();
    shop.repository.insert_product(fixtures::product(1, 1000, 10));
    shop.repository.insert_address(fixtures::address(1, 7));
    let user = UserId::new(7);
    let cancel = CancellationToken::new();
    let page = PageRequest::default();

    let empty = shop.orders.get_orders_by_user_id(user, page, None).await.unwrap();
    assert_eq!(empty.total, 0);
    assert_eq!(empty.total_pages, 0);

    let first = shop
        .orders
        .create_order(user, &buy_now(1, 1, 1), &cancel)
        .await
        .unwrap();
    let listed = shop.orders.get_orders_by_user_id(user, page, None).await.unwrap();
    assert_eq!(listed.total, 1);
    assert_eq!(listed.data[0].id, first.id);

    let second = shop
        .orders
        .create_order(user, &buy_now(1, 2, 1), &cancel)
        .await
        .unwrap();
    let listed = shop.orders.get_orders_by_user_id(user, page, None).await.unwrap();
    assert_eq!(listed.total, 2);

    let pending = shop
        .orders
        .get_orders_by_user_id(user, page, Some(OrderStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.total, 2);

    shop.orders
        .update_order_status(second.id, user, OrderStatus::Cancelled, &cancel)
        .await
        .unwrap();

    let pending = shop
        .orders
        .get_orders_by_user_id(user, page, Some(OrderStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.total, 1);
    assert_eq!(pending.data[0].id, first.id);

    let cancelled = shop
        .orders
        .get_orders_by_user_id(user, page, Some(OrderStatus::Cancelled))
        .await
        .unwrap();
    assert_eq!(cancelled.total, 1);
    assert_eq!(cancelled.data[0].status, OrderStatus::Cancelled);
}

/// Test: pagination metadata.
#[tokio::test]
async fn test_listing_pages_newest_first() {
    let shop = shop();
    shop.repository.insert_product(fixtures::product(1, 100, 50));
    shop.repository.insert_address(fixtures::address(1, 7));
    let user = UserId::new(7);

    let mut created = vec![];
    for quantity in 1..=5 {
        let order = shop
            .orders
            .create_order(user, &buy_now(1, quantity, 1), &CancellationToken::new())
            .await
            .unwrap();
        created.push(order.id);
    }

    let second_page = shop
        .orders
        .get_orders_by_user_id(user, PageRequest::new(2, 2).unwrap(), None)
        .await
        .unwrap();
    assert_eq!(second_page.total, 5);
    assert_eq!(second_page.total_pages, 3);
    assert_eq!(second_page.current_page, 2);
    assert_eq!(
        second_page.data.iter().map(|o| o.id).collect::<Vec<_>>(),
        vec![created[2], created[1]]
    );
}

/// Test: a cancelled waiter gives up without creating an order.
#[tokio::test]
async fn test_cancelled_waiter_creates_nothing() {
    let shop = shop();
    shop.repository.insert_product(fixtures::product(1, 1000, 5));
    shop.repository.insert_address(fixtures::address(1, 7));
    shop.store
        .set("lock:order:create:user:7:product:1:qty:1", "held", None)
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = shop
        .orders
        .create_order(UserId::new(7), &buy_now(1, 1, 1), &cancel)
        .await;

    assert_eq!(result, Err(OrderError::Cancelled));
    assert_eq!(shop.repository.order_count(), 0);
}

/// Test: paying through the mock gateway settles the order.
#[tokio::test]
async fn test_mock_payment_settles_order() {
    let shop = shop();
    shop.repository.insert_product(fixtures::product(1, 1000, 5));
    shop.repository.insert_address(fixtures::address(1, 7));
    let user = UserId::new(7);

    let order = shop
        .orders
        .create_order(user, &buy_now(1, 1, 1), &CancellationToken::new())
        .await
        .unwrap();

    let payments = PaymentService::new(Arc::clone(&shop.orders), MockPaymentGateway::new(), "wx-app");
    let ticket = payments.prepare(&order.order_no, user).await.unwrap();
    assert_eq!(ticket.package, format!("prepay_id=wx{}", order.id));

    let status = payments
        .confirm(&order.order_no, user, &CancellationToken::new())
        .await
        .unwrap();
    assert!(status.paid);

    let listed = shop
        .orders
        .get_orders_by_user_id(user, PageRequest::default(), Some(OrderStatus::Paid))
        .await
        .unwrap();
    assert_eq!(listed.total, 1);
}
