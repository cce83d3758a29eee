//! Prometheus metrics for the order core.
//!
//! Covers:
//! - Order creation and status changes
//! - Distributed lock contention
//! - Cache hit ratio
//! - Rate limiting decisions
//!
//! # Example
//!
//! ```rust,no_run
//! use storefront_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Serve `server.render()` at /metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address its scrape endpoint is served on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address the scrape endpoint will bind to
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint binds to.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Describe all metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// A recorder that is already installed (e.g. by another test) is not an
    /// error; `handle()` stays `None` in that case.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    // Orders
    describe_counter!("orders_created_total", "Orders persisted successfully");
    describe_counter!(
        "order_create_failures_total",
        "Order creations that failed, by reason"
    );
    describe_histogram!(
        "order_create_duration_seconds",
        "Time from request to persisted order, lock wait included"
    );
    describe_counter!(
        "order_status_changes_total",
        "Order status transitions, by target status"
    );
    describe_counter!(
        "order_stock_conflicts_total",
        "Guarded stock decrements rejected at persist time"
    );

    // Locks
    describe_counter!("lock_acquired_total", "Locks acquired");
    describe_counter!("lock_busy_total", "Lock acquisitions that exhausted retries");
    describe_counter!("lock_cancelled_total", "Lock acquisitions abandoned by the caller");
    describe_counter!(
        "lock_stale_releases_total",
        "Releases that found the lock expired or owned by someone else"
    );
    describe_histogram!("lock_wait_duration_seconds", "Time spent acquiring locks");

    // Cache
    describe_counter!("cache_hits_total", "Cache reads that found a value");
    describe_counter!("cache_misses_total", "Cache reads that found nothing");
    describe_counter!("cache_errors_total", "Cache operations that failed");

    // Rate limiting
    describe_counter!("rate_limit_allowed_total", "Requests admitted by the rate limiter");
    describe_counter!("rate_limit_rejected_total", "Requests rejected by the rate limiter");
    describe_counter!(
        "rate_limit_fail_open_total",
        "Requests admitted because the store was unavailable"
    );
}

/// Order metrics recorder.
pub struct OrderMetrics;

impl OrderMetrics {
    /// Record a persisted order.
    pub fn record_created(duration: Duration) {
        counter!("orders_created_total").increment(1);
        histogram!("order_create_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a failed creation.
    pub fn record_create_failure(reason: &'static str) {
        counter!("order_create_failures_total", "reason" => reason).increment(1);
    }

    /// Record a status change.
    pub fn record_status_change(to: &'static str) {
        counter!("order_status_changes_total", "to" => to).increment(1);
    }
}

/// Lock metrics recorder.
pub struct LockMetrics;

impl LockMetrics {
    /// Record an acquisition and how long it took.
    pub fn record_acquired(wait: Duration) {
        counter!("lock_acquired_total").increment(1);
        histogram!("lock_wait_duration_seconds").record(wait.as_secs_f64());
    }

    /// Record exhausted retries.
    pub fn record_busy() {
        counter!("lock_busy_total").increment(1);
    }

    /// Record a cancelled acquisition.
    pub fn record_cancelled() {
        counter!("lock_cancelled_total").increment(1);
    }

    /// Record a release that removed nothing.
    pub fn record_stale_release() {
        counter!("lock_stale_releases_total").increment(1);
    }
}

/// Cache metrics recorder.
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a hit.
    pub fn record_hit() {
        counter!("cache_hits_total").increment(1);
    }

    /// Record a miss.
    pub fn record_miss() {
        counter!("cache_misses_total").increment(1);
    }

    /// Record a failed cache operation.
    pub fn record_error() {
        counter!("cache_errors_total").increment(1);
    }
}

/// Rate limit metrics recorder.
pub struct RateLimitMetrics;

impl RateLimitMetrics {
    /// Record an admitted request.
    pub fn record_allowed() {
        counter!("rate_limit_allowed_total").increment(1);
    }

    /// Record a rejected request.
    pub fn record_rejected() {
        counter!("rate_limit_rejected_total").increment(1);
    }

    /// Record a request admitted during a store outage.
    pub fn record_fail_open() {
        counter!("rate_limit_fail_open_total").increment(1);
    }
}
