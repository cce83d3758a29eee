//! Axum middleware for request tracking and rate limiting.
//!
//! - **Request ids**: every request carries an `X-Request-Id`, taken from the
//!   client when it is a valid UUID and generated otherwise. The id is stored
//!   in request extensions, recorded on a tracing span, and echoed back in
//!   the response.
//! - **Rate limiting**: a fixed window per client IP, reported through
//!   `X-RateLimit-Limit` / `X-RateLimit-Remaining`.
//!
//! # Example
//!
//! ```ignore
//! use axum::{middleware::from_fn_with_state, Router};
//! use storefront_web::middleware::{rate_limit, request_id_layer};
//!
//! let app = Router::new()
//!     .route("/api/orders", get(list_orders))
//!     .layer(from_fn_with_state(limiter, rate_limit::<RedisStore>))
//!     .layer(request_id_layer());
//! ```

use crate::error::AppError;
use crate::extractors::ClientIp;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::task::{Context, Poll};
use storefront_core::store::KeyValueStore;
use storefront_runtime::{FixedWindowRateLimiter, RateLimitDecision};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for request ids.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Header reporting the per-window budget.
pub const RATE_LIMIT_LIMIT_HEADER: &str = "X-RateLimit-Limit";

/// Header reporting requests left in the window.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "X-RateLimit-Remaining";

/// Message returned with 429 responses.
pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

/// Request id assigned to the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(pub Uuid);

/// Create a layer that assigns request ids.
#[must_use]
pub const fn request_id_layer() -> RequestIdLayer {
    RequestIdLayer
}

/// Layer for request id tracking.
#[derive(Clone, Debug)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdMiddleware { inner }
    }
}

/// Middleware service for request id tracking.
#[derive(Clone, Debug)]
pub struct RequestIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for RequestIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let request_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        req.extensions_mut().insert(RequestId(request_id));

        let span = tracing::info_span!(
            "http_request",
            request_id = %request_id,
            method = %req.method(),
            path = %req.uri().path(),
        );

        let fut = self.inner.call(req);

        Box::pin(async move {
            let mut response = fut.instrument(span).await?;

            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }

            Ok(response)
        })
    }
}

/// Fixed-window rate limit keyed by client IP.
///
/// Install with `axum::middleware::from_fn_with_state`. Store failures are
/// absorbed by the limiter, which then admits the request.
pub async fn rate_limit<S>(
    State(limiter): State<FixedWindowRateLimiter<S>>,
    client_ip: ClientIp,
    request: Request,
    next: Next,
) -> Response
where
    S: KeyValueStore + 'static,
{
    match limiter.check(&client_ip.0.to_string()).await {
        RateLimitDecision::Allowed { limit, remaining } => {
            let mut response = next.run(request).await;
            set_budget(response.headers_mut(), limit, remaining);
            response
        }
        RateLimitDecision::Limited { limit, retry_after } => {
            let mut response = AppError::too_many_requests(RATE_LIMITED_MESSAGE).into_response();
            let headers = response.headers_mut();
            set_budget(headers, limit, 0);
            // Round up so clients never retry inside the window
            let seconds = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(seconds));
            response
        }
    }
}

fn set_budget(headers: &mut HeaderMap, limit: u64, remaining: u64) {
    headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(limit));
    headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(remaining));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::StatusCode,
        middleware::from_fn_with_state,
        routing::get,
        Extension, Router,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use storefront_runtime::RateLimitConfig;
    use storefront_testing::InMemoryStore;
    use tower::ServiceExt;

    fn limited_app(store: Arc<InMemoryStore>, max_requests: u64) -> Router {
        let limiter = FixedWindowRateLimiter::new(
            store,
            RateLimitConfig {
                max_requests,
                window: Duration::from_secs(60),
            },
        );
        Router::new()
            .route("/test", get(|| async { "ok" }))
            .layer(from_fn_with_state(limiter, rate_limit::<InMemoryStore>))
    }

    fn from_ip(ip: &str) -> Request {
        Request::builder()
            .uri("/test")
            .header("X-Forwarded-For", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_id_generated_if_missing() {
        let app = Router::new()
            .route("/test", get(|| async { "ok" }))
            .layer(request_id_layer());

        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .expect("Request id header should be present");
        assert!(Uuid::parse_str(request_id.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_request_id_preserved_and_visible_to_handlers() {
        async fn handler(Extension(id): Extension<RequestId>) -> String {
            id.0.to_string()
        }

        let app = Router::new()
            .route("/test", get(handler))
            .layer(request_id_layer());

        let request_uuid = Uuid::new_v4();
        let request = Request::builder()
            .uri("/test")
            .header(REQUEST_ID_HEADER, request_uuid.to_string())
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(
            response.headers().get(REQUEST_ID_HEADER).unwrap().to_str().unwrap(),
            request_uuid.to_string()
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, request_uuid.to_string().as_bytes());
    }

    #[tokio::test]
    async fn test_invalid_request_id_is_replaced() {
        let app = Router::new()
            .route("/test", get(|| async { "ok" }))
            .layer(request_id_layer());

        let request = Request::builder()
            .uri("/test")
            .header(REQUEST_ID_HEADER, "not-a-uuid")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        let id = response.headers().get(REQUEST_ID_HEADER).unwrap().to_str().unwrap();
        assert_ne!(id, "not-a-uuid");
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_rate_limit_reports_budget() {
        let app = limited_app(Arc::new(InMemoryStore::new()), 3);

        let response = app.oneshot(from_ip("203.0.113.1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[RATE_LIMIT_LIMIT_HEADER], "3");
        assert_eq!(response.headers()[RATE_LIMIT_REMAINING_HEADER], "2");
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_past_budget_per_client() {
        let app = limited_app(Arc::new(InMemoryStore::new()), 2);

        for _ in 0..2 {
            let response = app.clone().oneshot(from_ip("203.0.113.1")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(from_ip("203.0.113.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RATE_LIMIT_REMAINING_HEADER], "0");
        assert!(response.headers().contains_key(axum::http::header::RETRY_AFTER));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["code"], 429);
        assert_eq!(body["message"], RATE_LIMITED_MESSAGE);

        // Other clients keep their own budget
        let response = app.oneshot(from_ip("198.51.100.7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rate_limit_fails_open() {
        let store = Arc::new(InMemoryStore::new());
        let app = limited_app(Arc::clone(&store), 1);
        store.set_unavailable(true);

        for _ in 0..3 {
            let response = app.clone().oneshot(from_ip("203.0.113.1")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
