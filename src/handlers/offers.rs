//! Promotional banner endpoints.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::{no_content, ApiResponse};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/offers", get(list).post(create))
        .route("/offers/:id", axum::routing::delete(remove))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
struct NewOffer {
    offer_image: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/offers",
    responses((status = 200, description = "Active banners, newest first"))
)]
pub async fn list(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let offers = state.offers.list().await?;
    Ok(ApiResponse::ok(offers))
}

#[utoipa::path(
    post,
    path = "/api/v1/offers",
    responses((status = 201, description = "Banner created"))
)]
pub async fn create(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Json(payload): Json<NewOffer>,
) -> Result<Response, ServiceError> {
    principal.require_admin()?;
    let offer = state.offers.create(payload.offer_image).await?;
    Ok(ApiResponse::created(offer))
}

#[utoipa::path(
    delete,
    path = "/api/v1/offers/{id}",
    responses((status = 204, description = "Banner removed"))
)]
pub async fn remove(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    principal.require_admin()?;
    state.offers.delete(id).await?;
    Ok(no_content())
}
