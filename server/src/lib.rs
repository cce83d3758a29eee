//! Storefront order service.
//!
//! Wires the `PostgreSQL` repository, the Redis store and the HTTP adapter
//! into one process:
//!
//! - API on `HOST:PORT`
//! - Prometheus scrape endpoint at `/metrics` on `METRICS_HOST:METRICS_PORT`
//! - Graceful shutdown on Ctrl+C or SIGTERM, bounded by `SHUTDOWN_TIMEOUT`

pub mod config;

pub use config::Config;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use storefront_core::environment::SystemClock;
use storefront_core::error::{RepositoryError, StoreError};
use storefront_orders::{MockPaymentGateway, OrderEnvironment, OrderService, PaymentService};
use storefront_postgres::PostgresRepository;
use storefront_redis::RedisStore;
use storefront_runtime::metrics::{MetricsError, MetricsServer};
use storefront_runtime::{CancellationToken, FixedWindowRateLimiter};
use storefront_web::{build_router, AppState};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// Errors that stop the server from starting or serving.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Database connection or migration failed
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),
    /// Redis connection failed
    #[error("Redis error: {0}")]
    Store(#[from] StoreError),
    /// Metrics recorder could not be installed
    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),
    /// Listener bind or accept failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Router serving the Prometheus text format at `/metrics`.
pub fn metrics_router(metrics: Arc<MetricsServer>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics)
}

async fn render_metrics(State(metrics): State<Arc<MetricsServer>>) -> (StatusCode, String) {
    metrics.render().map_or_else(
        || (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed".to_string()),
        |body| (StatusCode::OK, body),
    )
}

/// Connect to every backend and serve until a shutdown signal arrives.
///
/// # Errors
///
/// Returns [`ServerError`] if a backend is unreachable, migrations fail, the
/// metrics recorder cannot be installed, or a listener cannot bind.
pub async fn run(config: Config) -> Result<(), ServerError> {
    let listener = TcpListener::bind(config.http_addr()).await?;
    let metrics_listener = TcpListener::bind(config.metrics_addr()).await?;

    let mut metrics = MetricsServer::new(metrics_listener.local_addr()?);
    metrics.start()?;
    let metrics = Arc::new(metrics);

    info!("Connecting to PostgreSQL...");
    let repository = PostgresRepository::connect(
        &config.postgres.url,
        config.postgres.max_connections,
        Duration::from_secs(config.postgres.connect_timeout),
    )
    .await?;
    repository.migrate().await?;
    info!("PostgreSQL connected and migrated");

    info!("Connecting to Redis...");
    let store = RedisStore::connect(&config.redis.url)
        .await?
        .with_key_prefix(config.redis.key_prefix.clone());
    store.ping().await?;
    info!("Redis connected");

    let store = Arc::new(store);
    let orders = Arc::new(OrderService::with_config(
        OrderEnvironment {
            repository: Arc::new(repository),
            store: Arc::clone(&store),
            clock: Arc::new(SystemClock),
        },
        config.order_service(),
    ));
    let payments = Arc::new(PaymentService::new(
        Arc::clone(&orders),
        MockPaymentGateway::new(),
        config.payment.wechat_app_id.clone(),
    ));
    let rate_limiter = FixedWindowRateLimiter::new(store, config.rate_limit());

    let shutdown = CancellationToken::new();
    let state = AppState::new(orders, payments, rate_limiter, shutdown.clone());

    info!(address = %listener.local_addr()?, "Server listening");
    info!(address = %metrics.addr(), "Metrics listening");

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let metrics_server = axum::serve(metrics_listener, metrics_router(metrics))
        .with_graceful_shutdown(cancelled(shutdown.clone()));
    let metrics_task = tokio::spawn(metrics_server.into_future());

    let api = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(cancelled(shutdown.clone()))
        .into_future();
    let timeout = config.shutdown_timeout();

    tokio::select! {
        result = api => result?,
        () = async {
            shutdown.cancelled().await;
            tokio::time::sleep(timeout).await;
        } => {
            warn!(timeout_secs = timeout.as_secs(), "Graceful shutdown timed out, dropping in-flight requests");
        }
    }

    metrics_task.abort();
    info!("Server stopped");
    Ok(())
}

async fn cancelled(token: CancellationToken) {
    token.cancelled().await;
}

/// Graceful shutdown signal handler.
///
/// Waits for:
/// - Ctrl+C (SIGINT)
/// - SIGTERM (in production environments)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
