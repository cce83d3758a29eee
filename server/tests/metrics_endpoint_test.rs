//! The Prometheus scrape endpoint.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use storefront_runtime::metrics::{MetricsServer, OrderMetrics};
use storefront_server::metrics_router;
use tower::ServiceExt;

fn scrape() -> Request<Body> {
    Request::builder().uri("/metrics").body(Body::empty()).unwrap()
}

/// Test: an installed recorder is rendered in the text format.
#[tokio::test]
async fn test_metrics_are_rendered() {
    let mut metrics = MetricsServer::new("127.0.0.1:0".parse().unwrap());
    metrics.start().unwrap();
    OrderMetrics::record_created(Duration::from_millis(5));

    let response = metrics_router(Arc::new(metrics)).oneshot(scrape()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(body.contains("orders_created_total"));
}

/// Test: without a recorder the endpoint reports unavailable.
#[tokio::test]
async fn test_missing_recorder_is_unavailable() {
    let metrics = MetricsServer::new("127.0.0.1:0".parse().unwrap());

    let response = metrics_router(Arc::new(metrics)).oneshot(scrape()).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
