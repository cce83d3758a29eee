//! Router construction.

use crate::handlers::{health_check, orders};
use crate::middleware::{rate_limit, request_id_layer};
use crate::state::AppState;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use storefront_core::environment::Clock;
use storefront_core::repository::StorefrontRepository;
use storefront_core::store::KeyValueStore;
use storefront_orders::PaymentGateway;
use tower_http::trace::TraceLayer;

/// Build the application router.
///
/// `/health` sits outside the rate limit; every `/api` route is limited per
/// client IP.
pub fn build_router<R, S, C, G>(state: AppState<R, S, C, G>) -> Router
where
    R: StorefrontRepository + 'static,
    S: KeyValueStore + 'static,
    C: Clock + 'static,
    G: PaymentGateway + 'static,
{
    let order_routes = Router::new()
        .route(
            "/orders",
            post(orders::create_order::<R, S, C, G>).get(orders::list_orders::<R, S, C, G>),
        )
        .route("/orders/detail", post(orders::order_detail::<R, S, C, G>))
        .route("/orders/pay/wechat", get(orders::wechat_pay::<R, S, C, G>))
        .route("/orders/pay/status", get(orders::payment_status::<R, S, C, G>))
        .route("/orders/no/:order_no", get(orders::get_order_by_no::<R, S, C, G>))
        .route("/orders/:id", get(orders::get_order::<R, S, C, G>))
        .route(
            "/orders/:id/status",
            put(orders::update_order_status::<R, S, C, G>),
        )
        .layer(from_fn_with_state(state.rate_limiter.clone(), rate_limit::<S>));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", order_routes)
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
        .with_state(state)
}
