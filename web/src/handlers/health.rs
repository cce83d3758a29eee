//! Health check endpoint.
//!
//! Used by load balancers to verify the process is serving requests.

use axum::http::StatusCode;

/// Liveness probe.
///
/// Does NOT check the database or Redis; the order endpoints degrade on
/// their own when those are unavailable.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
