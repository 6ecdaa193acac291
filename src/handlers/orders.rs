//! Checkout, order history, order administration, and the payment webhook.
//!
//! Two paths report a payment outcome: the client-asserted verify endpoint
//! (the storefront redirect target) and the HMAC-signed provider webhook.
//! Both feed the same finalization, which is idempotent on paid orders.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::entities::{OrderStatus, PaymentStatus, ShippingMethod};
use crate::errors::ServiceError;
use crate::handlers::common::{validate_input, ApiResponse, Paginated, PaginationParams};
use crate::services::orders::{AddressSnapshot, CheckoutRequest, NewOrderItem};
use crate::services::payments::{verify_webhook_signature, PaymentOutcome};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/checkout/online", post(checkout_online))
        .route("/checkout/cod", post(checkout_cod))
        .route("/checkout/verify", post(verify_checkout))
        .route("/orders", get(list_orders))
        .route("/orders/status", get(filter_by_status))
        .route("/orders/mine", get(my_orders))
        .route("/orders/:id", get(get_order).put(update_order))
        .route("/payments/webhook", post(payment_webhook))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
struct CheckoutItemBody {
    product_id: Uuid,
    #[validate(length(min = 1, message = "Item title is required"))]
    title: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    quantity: i32,
    unit_price: Decimal,
    image: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
struct CheckoutBody {
    // Emptiness is checked by the order service.
    #[validate]
    items: Vec<CheckoutItemBody>,
    amount: Decimal,
    address: AddressSnapshot,
    shipping_method: Option<ShippingMethod>,
    delivery_date: Option<DateTime<Utc>>,
}

impl CheckoutBody {
    fn into_request(self) -> CheckoutRequest {
        CheckoutRequest {
            items: self
                .items
                .into_iter()
                .map(|item| NewOrderItem {
                    product_id: item.product_id,
                    title: item.title,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    image: item.image,
                })
                .collect(),
            amount: self.amount,
            address: self.address,
            shipping_method: self.shipping_method,
            delivery_date: self.delivery_date,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
struct VerifyBody {
    order_id: Uuid,
    success: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
struct StatusFilter {
    status: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
struct OrderUpdateBody {
    order_status: Option<OrderStatus>,
    payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    order_id: Uuid,
    success: bool,
}

#[utoipa::path(
    post,
    path = "/api/v1/checkout/online",
    responses(
        (status = 200, description = "Pending order created, hosted checkout URL returned"),
        (status = 422, description = "Insufficient stock")
    )
)]
pub async fn checkout_online(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Json(payload): Json<CheckoutBody>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let initiation = state
        .orders
        .initiate_online_checkout(&principal, payload.into_request())
        .await?;
    Ok(ApiResponse::ok(json!({
        "order_id": initiation.order_id,
        "session_url": initiation.session_url,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/checkout/cod",
    responses((status = 201, description = "Order created and finalized as paid"))
)]
pub async fn checkout_cod(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Json(payload): Json<CheckoutBody>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let order = state
        .orders
        .initiate_cod_checkout(&principal, payload.into_request())
        .await?;
    Ok(ApiResponse::created(order))
}

#[utoipa::path(
    post,
    path = "/api/v1/checkout/verify",
    responses(
        (status = 200, description = "Order finalized as paid"),
        (status = 402, description = "Payment failed, order marked accordingly"),
        (status = 409, description = "Order already paid")
    )
)]
pub async fn verify_checkout(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Json(payload): Json<VerifyBody>,
) -> Result<Response, ServiceError> {
    // Ownership gate before the outcome is applied.
    state.orders.get_order(&principal, payload.order_id).await?;

    let outcome = PaymentOutcome {
        order_id: payload.order_id,
        success: payload.success,
    };

    let order = state.orders.finalize_order(outcome).await?;
    Ok(ApiResponse::ok(order))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses((status = 200, description = "All orders, newest first, with owner details"))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    principal.require_admin()?;
    let (page, per_page) = pagination.resolve(&state.config);
    let (rows, total) = state.orders.list_orders(page, per_page).await?;

    let items: Vec<_> = rows
        .into_iter()
        .map(|(order, user)| json!({ "order": order, "user": user }))
        .collect();

    Ok(ApiResponse::ok(Paginated {
        items,
        total,
        page,
        per_page,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/status",
    responses(
        (status = 200, description = "Orders with the given fulfillment status"),
        (status = 400, description = "Missing or unknown status value")
    )
)]
pub async fn filter_by_status(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Query(filter): Query<StatusFilter>,
) -> Result<Response, ServiceError> {
    principal.require_admin()?;

    let status = filter
        .status
        .ok_or_else(|| ServiceError::InvalidInput("status query parameter is required".to_string()))?;
    let status = match status.as_str() {
        "Processing" => OrderStatus::Processing,
        "Delivered" => OrderStatus::Delivered,
        "Cancelled" => OrderStatus::Cancelled,
        other => {
            return Err(ServiceError::InvalidInput(format!(
                "Unknown order status '{}'",
                other
            )))
        }
    };

    let orders = state.orders.filter_by_status(status).await?;
    Ok(ApiResponse::ok(orders))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/mine",
    responses((status = 200, description = "Caller's order history with item snapshots"))
)]
pub async fn my_orders(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
) -> Result<Response, ServiceError> {
    let orders = state.orders.user_orders(&principal).await?;
    let items: Vec<_> = orders
        .into_iter()
        .map(|(order, items)| json!({ "order": order, "items": items }))
        .collect();
    Ok(ApiResponse::ok(items))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    responses(
        (status = 200, description = "Order with its item snapshots"),
        (status = 403, description = "Order belongs to another user")
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let (order, items) = state.orders.get_order(&principal, id).await?;
    Ok(ApiResponse::ok(json!({ "order": order, "items": items })))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}",
    responses(
        (status = 200, description = "Updated order"),
        (status = 400, description = "Neither status field provided")
    )
)]
pub async fn update_order(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<OrderUpdateBody>,
) -> Result<Response, ServiceError> {
    principal.require_admin()?;
    let order = state
        .orders
        .update_order(id, payload.order_status, payload.payment_status)
        .await?;
    Ok(ApiResponse::ok(order))
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body(content = String, description = "Raw provider payload; kept as bytes for signature verification"),
    responses(
        (status = 200, description = "Outcome accepted"),
        (status = 401, description = "Bad or missing signature")
    )
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServiceError> {
    let secret = state.config.payment_webhook_secret.as_deref().ok_or_else(|| {
        ServiceError::InvalidOperation("Payment webhook is not configured".to_string())
    })?;

    if !verify_webhook_signature(
        &headers,
        &body,
        secret,
        state.config.payment_webhook_tolerance_secs,
    ) {
        warn!("payment webhook rejected: signature verification failed");
        return Err(ServiceError::Unauthorized(
            "Invalid webhook signature".to_string(),
        ));
    }

    let payload: WebhookBody = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::InvalidInput(format!("Malformed webhook payload: {}", e)))?;

    let outcome = PaymentOutcome {
        order_id: payload.order_id,
        success: payload.success,
    };

    match state.orders.finalize_order(outcome).await {
        Ok(_) => {}
        // Failed payments and duplicate deliveries are acknowledged so the
        // provider stops retrying.
        Err(ServiceError::PaymentFailed(_)) | Err(ServiceError::Conflict(_)) => {}
        Err(e) => return Err(e),
    }

    Ok(ApiResponse::ok(json!({ "received": true })))
}
