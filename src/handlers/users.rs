//! Authentication, profile, address book, and admin user listing.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::{no_content, validate_input, ApiResponse, Paginated, PaginationParams};
use crate::services::users::{AddressPatch, NewAddress, OtpRequest, OtpVerification, ProfilePatch};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/otp/request", post(request_otp))
        .route("/auth/otp/verify", post(verify_otp))
        .route("/auth/logout", post(logout))
        .route("/users/me", get(get_profile).put(update_profile))
        .route("/users/me/addresses", get(list_addresses).post(add_address))
        .route(
            "/users/me/addresses/:id",
            put(update_address).delete(delete_address),
        )
        .route("/admin/users", get(list_users))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/otp/request",
    responses((status = 200, description = "OTP issued for the phone number"))
)]
pub async fn request_otp(
    State(state): State<AppState>,
    Json(payload): Json<OtpRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    state.users.request_otp(payload).await?;
    Ok(ApiResponse::ok(json!({ "message": "OTP sent" })))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/otp/verify",
    responses(
        (status = 200, description = "Code accepted, bearer token returned"),
        (status = 401, description = "Invalid or expired code")
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<OtpVerification>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let (user, token) = state.users.verify_otp(payload).await?;
    Ok(ApiResponse::ok(json!({ "token": token, "user": user })))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses((status = 204, description = "Session flag cleared"))
)]
pub async fn logout(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
) -> Result<Response, ServiceError> {
    state.users.logout(&principal).await?;
    Ok(no_content())
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses((status = 200, description = "Caller's profile"))
)]
pub async fn get_profile(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
) -> Result<Response, ServiceError> {
    let user = state.users.get_profile(&principal).await?;
    Ok(ApiResponse::ok(user))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    responses((status = 200, description = "Updated profile"))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Json(payload): Json<ProfilePatch>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let user = state.users.update_profile(&principal, payload).await?;
    Ok(ApiResponse::ok(user))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me/addresses",
    responses((status = 200, description = "Caller's address book"))
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
) -> Result<Response, ServiceError> {
    let addresses = state.users.list_addresses(&principal).await?;
    Ok(ApiResponse::ok(addresses))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/me/addresses",
    responses(
        (status = 201, description = "Address saved"),
        (status = 409, description = "Duplicate landmark")
    )
)]
pub async fn add_address(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Json(payload): Json<NewAddress>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let address = state.users.add_address(&principal, payload).await?;
    Ok(ApiResponse::created(address))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/me/addresses/{id}",
    responses(
        (status = 200, description = "Updated address"),
        (status = 409, description = "Duplicate landmark")
    )
)]
pub async fn update_address(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddressPatch>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let address = state.users.update_address(&principal, id, payload).await?;
    Ok(ApiResponse::ok(address))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/me/addresses/{id}",
    responses((status = 204, description = "Address removed"))
)]
pub async fn delete_address(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.users.delete_address(&principal, id).await?;
    Ok(no_content())
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    responses((status = 200, description = "Paginated account listing, newest first"))
)]
pub async fn list_users(
    State(state): State<AppState>,
    principal: AuthenticatedUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    principal.require_admin()?;
    let (page, per_page) = pagination.resolve(&state.config);
    let (users, total) = state.users.list_users(page, per_page).await?;
    Ok(ApiResponse::ok(Paginated {
        items: users,
        total,
        page,
        per_page,
    }))
}
