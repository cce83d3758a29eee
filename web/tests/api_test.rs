//! HTTP tests driving the full router against in-memory adapters.
//!
//! Each test builds a fresh router with `tower::ServiceExt::oneshot`, so no
//! socket is bound.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use storefront_orders::{MockPaymentGateway, OrderEnvironment, OrderService, PaymentService};
use storefront_runtime::{CancellationToken, FixedWindowRateLimiter, RateLimitConfig};
use storefront_testing::mocks::test_clock;
use storefront_testing::{fixtures, InMemoryRepository, InMemoryStore};
use storefront_web::{build_router, AppState, USER_ID_HEADER};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    repository: Arc<InMemoryRepository>,
}

fn app_with_limit(max_requests: u64) -> TestApp {
    storefront_testing::init_tracing();
    let repository = Arc::new(InMemoryRepository::new());
    let store = Arc::new(InMemoryStore::new());
    let orders = Arc::new(OrderService::new(OrderEnvironment {
        repository: Arc::clone(&repository),
        store: Arc::clone(&store),
        clock: Arc::new(test_clock()),
    }));
    let payments = Arc::new(PaymentService::new(
        Arc::clone(&orders),
        MockPaymentGateway::new(),
        "wx_test_app",
    ));
    let limiter = FixedWindowRateLimiter::new(
        store,
        RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
        },
    );
    let state = AppState::new(orders, payments, limiter, CancellationToken::new());

    TestApp {
        router: build_router(state),
        repository,
    }
}

fn app() -> TestApp {
    let app = app_with_limit(1_000);
    app.repository.insert_product(fixtures::product(1, 1000, 5));
    app.repository.insert_address(fixtures::address(1, 7));
    app.repository.insert_cart_item(fixtures::cart_item(10, 7, 1, 2));
    app
}

impl TestApp {
    async fn send(&self, method: Method, uri: &str, user: Option<u64>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            request = request.header(USER_ID_HEADER, user.to_string());
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn place_direct(&self, user: u64, product: u64, quantity: u32) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/orders",
            Some(user),
            Some(json!({"product_id": product, "quantity": quantity, "address_id": 1})),
        )
        .await
    }
}

/// Test: liveness probe needs no identity.
#[tokio::test]
async fn test_health_is_public() {
    let app = app();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// Test: order endpoints reject requests without a caller.
#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let app = app();
    let (status, body) = app.send(Method::GET, "/api/orders", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 401);
    assert!(body.get("data").is_none());
}

/// Test: pricing a cart line places nothing.
#[tokio::test]
async fn test_order_detail_prices_cart_lines() {
    let app = app();
    let (status, body) = app
        .send(Method::POST, "/api/orders/detail", Some(7), Some(json!({"cart_ids": [10]})))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 200);
    assert_eq!(body["message"], "success");
    assert_eq!(body["data"]["total_amount"], 2000);
    assert_eq!(body["data"]["items"][0]["quantity"], 2);
    assert_eq!(app.repository.order_count(), 0);
}

/// Test: cart checkout through the API, then reading the order back.
#[tokio::test]
async fn test_create_then_read_order() {
    let app = app();
    let (status, body) = app
        .send(
            Method::POST,
            "/api/orders",
            Some(7),
            Some(json!({"cart_ids": [10], "address_id": 1, "payment_type": 1})),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let order = &body["data"];
    assert_eq!(order["status"], 1);
    assert_eq!(order["total_amount"], 2000);
    let id = order["id"].as_u64().unwrap();
    let order_no = order["order_no"].as_str().unwrap().to_string();

    let (status, body) = app.send(Method::GET, &format!("/api/orders/{id}"), Some(7), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order_no"], order_no.as_str());

    let (status, body) = app
        .send(Method::GET, &format!("/api/orders/no/{order_no}"), Some(7), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id);

    assert_eq!(app.repository.product(storefront_core::types::ProductId::new(1)).unwrap().stock, 3);
}

/// Test: another user's order is reported as missing.
#[tokio::test]
async fn test_foreign_order_is_not_found() {
    let app = app();
    let (_, body) = app.place_direct(7, 1, 1).await;
    let id = body["data"]["id"].as_u64().unwrap();

    let (status, body) = app.send(Method::GET, &format!("/api/orders/{id}"), Some(8), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);

    let (status, _) = app.send(Method::GET, "/api/orders/not-a-number", Some(7), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Test: stock shortfalls and malformed bodies are client errors.
#[tokio::test]
async fn test_validation_failures_are_bad_requests() {
    let app = app();

    let (status, body) = app.place_direct(7, 1, 6).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);

    let (status, _) = app
        .send(Method::POST, "/api/orders", Some(7), Some(json!({"address_id": 1})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(Method::POST, "/api/orders", Some(7), Some(json!({"cart_ids": "ten"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);

    assert_eq!(app.repository.order_count(), 0);
}

/// Test: another user's cart line and an unknown one get the same answer.
#[tokio::test]
async fn test_foreign_and_unknown_cart_lines_are_indistinguishable() {
    let app = app();
    app.repository.insert_cart_item(fixtures::cart_item(20, 8, 1, 1));

    let (foreign_status, foreign) = app
        .send(Method::POST, "/api/orders/detail", Some(7), Some(json!({"cart_ids": [20]})))
        .await;
    let (unknown_status, unknown) = app
        .send(Method::POST, "/api/orders/detail", Some(7), Some(json!({"cart_ids": [99]})))
        .await;

    assert_eq!(foreign_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, foreign_status);
    assert_eq!(unknown, foreign);
}

/// Test: checking out the same cart line twice reports the stock as gone.
#[tokio::test]
async fn test_repeated_cart_checkout_is_out_of_stock() {
    let app = app();
    let checkout = json!({"cart_ids": [10], "address_id": 1});

    let (status, _) = app.send(Method::POST, "/api/orders", Some(7), Some(checkout.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(Method::POST, "/api/orders", Some(7), Some(checkout)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Product 1 is out of stock");
    assert_eq!(app.repository.order_count(), 1);
}

/// Test: listing with paging and a status filter.
#[tokio::test]
async fn test_list_orders_pages_and_filters() {
    let app = app();
    for _ in 0..3 {
        let (status, _) = app.place_direct(7, 1, 1).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app
        .send(Method::GET, "/api/orders?page=1&page_size=2", Some(7), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["total_pages"], 2);
    assert_eq!(body["data"]["data"].as_array().unwrap().len(), 2);

    let (_, body) = app.send(Method::GET, "/api/orders?status=2", Some(7), None).await;
    assert_eq!(body["data"]["total"], 0);

    let (status, _) = app.send(Method::GET, "/api/orders?status=99", Some(7), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unparseable paging falls back to defaults
    let (status, body) = app
        .send(Method::GET, "/api/orders?page=x&page_size=y", Some(7), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["page_size"], 10);
    assert_eq!(body["data"]["current_page"], 1);
}

/// Test: status updates follow the lifecycle.
#[tokio::test]
async fn test_update_status_lifecycle() {
    let app = app();
    let (_, body) = app.place_direct(7, 1, 1).await;
    let id = body["data"]["id"].as_u64().unwrap();
    let uri = format!("/api/orders/{id}/status");

    let (status, body) = app.send(Method::PUT, &uri, Some(7), Some(json!({"status": 2}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], 2);
    assert!(!body["data"]["payment_time"].is_null());

    let (status, _) = app.send(Method::PUT, &uri, Some(7), Some(json!({"status": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send(Method::PUT, &uri, Some(7), Some(json!({"status": 42}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send(Method::PUT, &uri, Some(8), Some(json!({"status": 3}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// Test: the mock WeChat flow settles a pending order.
#[tokio::test]
async fn test_mock_payment_flow() {
    let app = app();
    let (_, body) = app.place_direct(7, 1, 1).await;
    let order_no = body["data"]["order_no"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(Method::GET, &format!("/api/orders/pay/wechat?order_no={order_no}"), Some(7), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["payment_id"], format!("wx{order_no}"));
    assert_eq!(body["data"]["app_id"], "wx_test_app");

    let (status, body) = app
        .send(Method::GET, &format!("/api/orders/pay/status?order_no={order_no}"), Some(7), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["paid"], true);
    assert_eq!(body["data"]["status"], 2);

    // Paid orders no longer issue payment parameters
    let (status, _) = app
        .send(Method::GET, &format!("/api/orders/pay/wechat?order_no={order_no}"), Some(7), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send(Method::GET, "/api/orders/pay/status", Some(7), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Test: the API is rate limited per client, health is not.
#[tokio::test]
async fn test_api_rate_limit() {
    let app = app_with_limit(2);

    for _ in 0..2 {
        let (status, _) = app.send(Method::GET, "/api/orders", Some(7), None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = app.send(Method::GET, "/api/orders", Some(7), None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["message"], "Rate limit exceeded. Please try again later.");

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
