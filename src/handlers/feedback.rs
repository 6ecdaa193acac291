//! Product review endpoints.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::{no_content, validate_input, ApiResponse};
use crate::services::feedback::NewFeedback;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/feedback", post(submit))
        .route("/feedback/:id", delete(remove))
        .route("/products/:id/feedback", get(for_product))
}

#[utoipa::path(
    post,
    path = "/api/v1/feedback",
    responses((status = 201, description = "Review recorded"))
)]
pub async fn submit(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Json(payload): Json<NewFeedback>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let feedback = state.feedback.submit(&principal, payload).await?;
    Ok(ApiResponse::created(feedback))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}/feedback",
    responses((status = 200, description = "Reviews for the product, newest first"))
)]
pub async fn for_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let rows = state.feedback.for_product(id).await?;
    let items: Vec<_> = rows
        .into_iter()
        .map(|(feedback, user)| json!({ "feedback": feedback, "user": user }))
        .collect();
    Ok(ApiResponse::ok(items))
}

#[utoipa::path(
    delete,
    path = "/api/v1/feedback/{id}",
    responses(
        (status = 204, description = "Review deleted"),
        (status = 403, description = "Not the author or an admin")
    )
)]
pub async fn remove(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.feedback.delete(&principal, id).await?;
    Ok(no_content())
}
