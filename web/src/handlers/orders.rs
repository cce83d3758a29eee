//! Order API endpoints.
//!
//! - POST /api/orders/detail - Price an order without placing it
//! - POST /api/orders - Place an order from cart lines or a direct purchase
//! - GET /api/orders - List the caller's orders (`page`, `page_size`, `status`)
//! - GET /api/orders/:id - Get an order by id
//! - GET /api/orders/no/:order_no - Get an order by order number
//! - PUT /api/orders/:id/status - Move an order through its lifecycle
//! - GET /api/orders/pay/wechat - Mock WeChat payment parameters
//! - GET /api/orders/pay/status - Confirm a mock payment
//!
//! Every endpoint requires the `X-User-Id` header and answers with the
//! standard envelope.

#![allow(clippy::missing_errors_doc)] // Errors are the standard AppError envelope

use crate::error::AppError;
use crate::extractors::AuthenticatedUser;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::WebResult;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;
use storefront_core::environment::Clock;
use storefront_core::repository::StorefrontRepository;
use storefront_core::store::KeyValueStore;
use storefront_core::types::{
    CreateOrderRequest, IntentRequest, Order, OrderDetail, OrderId, OrderStatus, Page, PageRequest,
};
use storefront_orders::{PaymentGateway, PaymentStatus, WechatPayTicket};

type ApiResult<T> = WebResult<ApiResponse<T>>;

// ============================================================================
// Request Types
// ============================================================================

/// Query string of the listing endpoint.
///
/// Values that do not parse fall back to the defaults, except `status`,
/// which must be a known status code when present.
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    /// Page number, 1-based (default 1)
    pub page: Option<String>,
    /// Page size (default 10, at most 50)
    pub page_size: Option<String>,
    /// Status code filter
    pub status: Option<String>,
}

impl ListOrdersQuery {
    fn page_request(&self) -> PageRequest {
        let parse = |value: &Option<String>| value.as_deref().and_then(|v| v.trim().parse().ok());
        PageRequest::clamped(parse(&self.page), parse(&self.page_size))
    }

    fn status(&self) -> Result<Option<OrderStatus>, AppError> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<u8>()
                .ok()
                .and_then(OrderStatus::from_code)
                .map(Some)
                .ok_or_else(|| AppError::bad_request(format!("Invalid status: {raw}"))),
        }
    }
}

/// Body of the status update endpoint.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// Target status code
    pub status: OrderStatus,
}

/// Query string of the payment endpoints.
#[derive(Debug, Deserialize)]
pub struct PaymentQuery {
    /// Order number to pay or check
    pub order_no: Option<String>,
}

impl PaymentQuery {
    fn order_no(&self) -> Result<&str, AppError> {
        self.order_no
            .as_deref()
            .map(str::trim)
            .filter(|no| !no.is_empty())
            .ok_or_else(|| AppError::bad_request("Missing order number"))
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

fn query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

fn order_id(raw: &str) -> Result<OrderId, AppError> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id > 0)
        .map(OrderId::new)
        .ok_or_else(|| AppError::bad_request(format!("Invalid order id: {raw}")))
}

// ============================================================================
// Handlers
// ============================================================================

/// Price cart lines or a direct purchase without placing the order.
pub async fn order_detail<R, S, C, G>(
    State(state): State<AppState<R, S, C, G>>,
    AuthenticatedUser(user): AuthenticatedUser,
    body: Result<Json<IntentRequest>, JsonRejection>,
) -> ApiResult<OrderDetail>
where
    R: StorefrontRepository + 'static,
    S: KeyValueStore + 'static,
    C: Clock + 'static,
    G: PaymentGateway + 'static,
{
    let intent = json_body(body)?.intent()?;
    let detail = state.orders.get_order_detail(user, &intent).await?;
    Ok(ApiResponse::success(detail))
}

/// Place an order.
pub async fn create_order<R, S, C, G>(
    State(state): State<AppState<R, S, C, G>>,
    AuthenticatedUser(user): AuthenticatedUser,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<Order>
where
    R: StorefrontRepository + 'static,
    S: KeyValueStore + 'static,
    C: Clock + 'static,
    G: PaymentGateway + 'static,
{
    let request = json_body(body)?;
    let cancel = state.request_token();
    let order = state.orders.create_order(user, &request, &cancel).await?;
    Ok(ApiResponse::success(order))
}

/// One page of the caller's orders, newest first.
pub async fn list_orders<R, S, C, G>(
    State(state): State<AppState<R, S, C, G>>,
    AuthenticatedUser(user): AuthenticatedUser,
    params: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> ApiResult<Page<Order>>
where
    R: StorefrontRepository + 'static,
    S: KeyValueStore + 'static,
    C: Clock + 'static,
    G: PaymentGateway + 'static,
{
    let params = query(params)?;
    let status = params.status()?;
    let page = state
        .orders
        .get_orders_by_user_id(user, params.page_request(), status)
        .await?;
    Ok(ApiResponse::success(page))
}

/// Get an order by id.
pub async fn get_order<R, S, C, G>(
    State(state): State<AppState<R, S, C, G>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Order>
where
    R: StorefrontRepository + 'static,
    S: KeyValueStore + 'static,
    C: Clock + 'static,
    G: PaymentGateway + 'static,
{
    let order = state.orders.get_order_by_id(order_id(&id)?, user).await?;
    Ok(ApiResponse::success(order))
}

/// Get an order by order number.
pub async fn get_order_by_no<R, S, C, G>(
    State(state): State<AppState<R, S, C, G>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(order_no): Path<String>,
) -> ApiResult<Order>
where
    R: StorefrontRepository + 'static,
    S: KeyValueStore + 'static,
    C: Clock + 'static,
    G: PaymentGateway + 'static,
{
    let order = state.orders.get_order_by_order_no(&order_no, user).await?;
    Ok(ApiResponse::success(order))
}

/// Move an order to a new status.
pub async fn update_order_status<R, S, C, G>(
    State(state): State<AppState<R, S, C, G>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> ApiResult<Order>
where
    R: StorefrontRepository + 'static,
    S: KeyValueStore + 'static,
    C: Clock + 'static,
    G: PaymentGateway + 'static,
{
    let id = order_id(&id)?;
    let request = json_body(body)?;
    let cancel = state.request_token();
    let order = state
        .orders
        .update_order_status(id, user, request.status, &cancel)
        .await?;
    Ok(ApiResponse::success(order))
}

/// Mock WeChat payment parameters for a pending order.
pub async fn wechat_pay<R, S, C, G>(
    State(state): State<AppState<R, S, C, G>>,
    AuthenticatedUser(user): AuthenticatedUser,
    params: Result<Query<PaymentQuery>, QueryRejection>,
) -> ApiResult<WechatPayTicket>
where
    R: StorefrontRepository + 'static,
    S: KeyValueStore + 'static,
    C: Clock + 'static,
    G: PaymentGateway + 'static,
{
    let params = query(params)?;
    let ticket = state.payments.prepare(params.order_no()?, user).await?;
    Ok(ApiResponse::success(ticket))
}

/// Confirm a mock payment, settling the order when it succeeds.
pub async fn payment_status<R, S, C, G>(
    State(state): State<AppState<R, S, C, G>>,
    AuthenticatedUser(user): AuthenticatedUser,
    params: Result<Query<PaymentQuery>, QueryRejection>,
) -> ApiResult<PaymentStatus>
where
    R: StorefrontRepository + 'static,
    S: KeyValueStore + 'static,
    C: Clock + 'static,
    G: PaymentGateway + 'static,
{
    let params = query(params)?;
    let cancel = state.request_token();
    let status = state
        .payments
        .confirm(params.order_no()?, user, &cancel)
        .await?;
    Ok(ApiResponse::success(status))
}
