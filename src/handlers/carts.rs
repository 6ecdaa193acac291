//! Shopping cart endpoints. Every response returns the cart with its lines
//! so the storefront can re-render without a second fetch.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::entities::{CartItemModel, CartModel};
use crate::errors::ServiceError;
use crate::handlers::common::{validate_input, ApiResponse};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/items", post(add_item))
        .route(
            "/cart/items/:product_id",
            put(update_quantity).delete(remove_item),
        )
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
struct AddCartItem {
    product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
struct SetQuantity {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    quantity: i32,
}

fn cart_body(cart: CartModel, items: Vec<CartItemModel>) -> Response {
    ApiResponse::ok(json!({ "cart": cart, "items": items }))
}

#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses((status = 200, description = "Caller's cart, created on first touch"))
)]
pub async fn get_cart(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
) -> Result<Response, ServiceError> {
    let (cart, items) = state.carts.get_cart(&principal).await?;
    Ok(cart_body(cart, items))
}

#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    responses((status = 200, description = "Cart after adding the product"))
)]
pub async fn add_item(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Json(payload): Json<AddCartItem>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let (cart, items) = state
        .carts
        .add_item(&principal, payload.product_id, payload.quantity)
        .await?;
    Ok(cart_body(cart, items))
}

#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{product_id}",
    responses(
        (status = 200, description = "Cart after the quantity change"),
        (status = 404, description = "Product is not in the cart")
    )
)]
pub async fn update_quantity(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<SetQuantity>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let (cart, items) = state
        .carts
        .update_quantity(&principal, product_id, payload.quantity)
        .await?;
    Ok(cart_body(cart, items))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{product_id}",
    responses((status = 200, description = "Cart after removing the line"))
)]
pub async fn remove_item(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(product_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let (cart, items) = state.carts.remove_item(&principal, product_id).await?;
    Ok(cart_body(cart, items))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Emptied cart"),
        (status = 404, description = "Cart was already empty")
    )
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
) -> Result<Response, ServiceError> {
    let cart = state.carts.clear_cart(&principal).await?;
    Ok(ApiResponse::ok(cart))
}
