//! E-commerce backend for a phone storefront: OTP login, product catalog
//! with per-variant stock, carts, wishlists, reviews, promotional offers,
//! and an order workflow with Stripe hosted checkout and cash on delivery.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use sea_orm::DatabaseConnection;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use utoipa::OpenApi;

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod request_id;
pub mod services;

#[cfg(test)]
pub mod test_support;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::payments::PaymentProvider;
use crate::services::users::SmsSender;
use crate::services::{
    CartService, CatalogService, FeedbackService, OfferService, OrderService, StockService,
    UserService, WishlistService,
};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub users: UserService,
    pub catalog: CatalogService,
    pub carts: CartService,
    pub orders: OrderService,
    pub wishlists: WishlistService,
    pub feedback: FeedbackService,
    pub offers: OfferService,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        event_sender: Arc<EventSender>,
        provider: Arc<dyn PaymentProvider>,
        sms: Arc<dyn SmsSender>,
    ) -> Self {
        let stock = StockService::new(db.clone());
        Self {
            users: UserService::new(db.clone(), event_sender.clone(), config.clone(), sms),
            catalog: CatalogService::new(db.clone(), event_sender.clone()),
            carts: CartService::new(db.clone(), event_sender.clone()),
            orders: OrderService::new(db.clone(), event_sender.clone(), stock, provider),
            wishlists: WishlistService::new(db.clone()),
            feedback: FeedbackService::new(db.clone()),
            offers: OfferService::new(db.clone()),
            db,
            config,
            event_sender,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "cybershop-api", description = "Phone storefront backend"),
    paths(
        handlers::users::request_otp,
        handlers::users::verify_otp,
        handlers::users::logout,
        handlers::users::get_profile,
        handlers::users::update_profile,
        handlers::users::list_addresses,
        handlers::users::add_address,
        handlers::users::update_address,
        handlers::users::delete_address,
        handlers::users::list_users,
        handlers::products::list_products,
        handlers::products::get_product,
        handlers::products::create_product,
        handlers::products::update_product,
        handlers::products::delete_product,
        handlers::products::create_variant,
        handlers::products::update_variant,
        handlers::products::delete_variant,
        handlers::carts::get_cart,
        handlers::carts::add_item,
        handlers::carts::update_quantity,
        handlers::carts::remove_item,
        handlers::carts::clear_cart,
        handlers::orders::checkout_online,
        handlers::orders::checkout_cod,
        handlers::orders::verify_checkout,
        handlers::orders::list_orders,
        handlers::orders::filter_by_status,
        handlers::orders::my_orders,
        handlers::orders::get_order,
        handlers::orders::update_order,
        handlers::orders::payment_webhook,
        handlers::wishlists::list,
        handlers::wishlists::add,
        handlers::wishlists::remove,
        handlers::feedback::submit,
        handlers::feedback::for_product,
        handlers::feedback::remove,
        handlers::offers::list,
        handlers::offers::create,
        handlers::offers::remove,
    )
)]
pub struct ApiDoc;

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn openapi_spec() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// All versioned API routes, without middleware.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::users::routes())
        .merge(handlers::products::routes())
        .merge(handlers::carts::routes())
        .merge(handlers::orders::routes())
        .merge(handlers::wishlists::routes())
        .merge(handlers::feedback::routes())
        .merge(handlers::offers::routes())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if config.has_cors_allowed_origins() {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .as_deref()
            .unwrap_or("")
            .split(',')
            .filter_map(|origin| {
                let origin = origin.trim();
                if origin.is_empty() {
                    None
                } else {
                    origin.parse().ok()
                }
            })
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    } else {
        warn!("CORS is permissive; do not run this configuration in production");
        layer.allow_origin(Any)
    }
}

/// Builds the full application router with middleware applied.
pub fn build_app(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        .route("/health", get(health_check))
        .route("/api/docs/openapi.json", get(openapi_spec))
        .nest("/api/v1", api_v1_routes())
        .layer(axum::middleware::from_fn(request_id::propagate_request_id))
        .layer(TraceLayer::new_for_http().make_span_with(request_id::RequestSpanMaker))
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors_layer(&config))
        .with_state(state)
}
