//! Public catalog reads and admin catalog management.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::{no_content, validate_input, ApiResponse};
use crate::services::catalog::{NewProduct, NewVariant, ProductPatch, VariantPatch};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products/:id/variants", post(create_variant))
        .route("/variants/:id", put(update_variant).delete(delete_variant))
}

#[derive(Debug, Deserialize, IntoParams)]
struct CatalogFilter {
    category: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    responses((status = 200, description = "Catalog listing, optionally filtered by category"))
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<CatalogFilter>,
) -> Result<Response, ServiceError> {
    let products = state.catalog.list_products(filter.category).await?;
    Ok(ApiResponse::ok(products))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    responses(
        (status = 200, description = "Product detail with its variants"),
        (status = 404, description = "Unknown product")
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let (product, variants) = state.catalog.get_product_with_variants(id).await?;
    Ok(ApiResponse::ok(json!({
        "product": product,
        "variants": variants,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    responses(
        (status = 201, description = "Product created"),
        (status = 409, description = "Duplicate title")
    )
)]
pub async fn create_product(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Json(payload): Json<NewProduct>,
) -> Result<Response, ServiceError> {
    principal.require_admin()?;
    validate_input(&payload)?;
    let product = state.catalog.create_product(payload).await?;
    Ok(ApiResponse::created(product))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    responses((status = 200, description = "Updated product"))
)]
pub async fn update_product(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProductPatch>,
) -> Result<Response, ServiceError> {
    principal.require_admin()?;
    validate_input(&payload)?;
    let product = state.catalog.update_product(id, payload).await?;
    Ok(ApiResponse::ok(product))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    responses((status = 204, description = "Product and its variants removed"))
)]
pub async fn delete_product(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    principal.require_admin()?;
    state.catalog.delete_product(id).await?;
    Ok(no_content())
}

#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/variants",
    responses(
        (status = 201, description = "Variant created"),
        (status = 409, description = "Duplicate color/storage combination")
    )
)]
pub async fn create_variant(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewVariant>,
) -> Result<Response, ServiceError> {
    principal.require_admin()?;
    validate_input(&payload)?;
    let variant = state.catalog.create_variant(id, payload).await?;
    Ok(ApiResponse::created(variant))
}

#[utoipa::path(
    put,
    path = "/api/v1/variants/{id}",
    responses((status = 200, description = "Updated variant"))
)]
pub async fn update_variant(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<VariantPatch>,
) -> Result<Response, ServiceError> {
    principal.require_admin()?;
    validate_input(&payload)?;
    let variant = state.catalog.update_variant(id, payload).await?;
    Ok(ApiResponse::ok(variant))
}

#[utoipa::path(
    delete,
    path = "/api/v1/variants/{id}",
    responses((status = 204, description = "Variant removed"))
)]
pub async fn delete_variant(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    principal.require_admin()?;
    state.catalog.delete_variant(id).await?;
    Ok(no_content())
}
