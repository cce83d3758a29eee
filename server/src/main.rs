//! Storefront order service binary.
//!
//! # Usage
//!
//! ```bash
//! # Start infrastructure
//! docker run -d -p 5432:5432 -e POSTGRES_PASSWORD=postgres postgres:16-alpine
//! docker run -d -p 6379:6379 redis:7-alpine
//!
//! # Run server
//! cargo run --bin storefront-server
//! ```

use storefront_server::{run, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storefront=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(
        http = %config.http_addr(),
        metrics = %config.metrics_addr(),
        redis = %config.redis.url,
        "Configuration loaded"
    );

    run(config).await?;
    Ok(())
}
