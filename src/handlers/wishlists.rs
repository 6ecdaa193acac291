//! Wishlist endpoints.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::{no_content, ApiResponse};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/wishlist", get(list).post(add))
        .route("/wishlist/:product_id", axum::routing::delete(remove))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
struct AddWishlistItem {
    product_id: Uuid,
}

#[utoipa::path(
    get,
    path = "/api/v1/wishlist",
    responses((status = 200, description = "Saved products, newest first"))
)]
pub async fn list(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
) -> Result<Response, ServiceError> {
    let rows = state.wishlists.list(&principal).await?;
    let items: Vec<_> = rows
        .into_iter()
        .map(|(entry, product)| json!({ "entry": entry, "product": product }))
        .collect();
    Ok(ApiResponse::ok(items))
}

#[utoipa::path(
    post,
    path = "/api/v1/wishlist",
    responses(
        (status = 201, description = "Product saved"),
        (status = 409, description = "Already in the wishlist")
    )
)]
pub async fn add(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Json(payload): Json<AddWishlistItem>,
) -> Result<Response, ServiceError> {
    let entry = state.wishlists.add(&principal, payload.product_id).await?;
    Ok(ApiResponse::created(entry))
}

#[utoipa::path(
    delete,
    path = "/api/v1/wishlist/{product_id}",
    responses((status = 204, description = "Product removed from the wishlist"))
)]
pub async fn remove(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(product_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.wishlists.remove(&principal, product_id).await?;
    Ok(no_content())
}
