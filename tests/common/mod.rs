//! Shared harness for integration tests: a real router over a throwaway
//! SQLite database, with helpers for seeding data and issuing requests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use sea_orm_migration::MigratorTrait;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use cybershop_api::auth::issue_token;
use cybershop_api::config::AppConfig;
use cybershop_api::db;
use cybershop_api::entities::{
    product, product_variant, user, ProductModel, ProductVariantModel, UserModel, UserRole,
};
use cybershop_api::errors::ServiceError;
use cybershop_api::events::{process_events, EventSender};
use cybershop_api::migrator::Migrator;
use cybershop_api::services::payments::{
    CheckoutSession, CheckoutSessionRequest, PaymentProvider,
};
use cybershop_api::services::users::LoggingSms;
use cybershop_api::{build_app, AppState};

/// Provider stub that always hands back a hosted-checkout URL.
pub struct StubProvider;

#[async_trait]
impl PaymentProvider for StubProvider {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        Ok(CheckoutSession {
            id: format!("cs_test_{}", request.order_id),
            url: format!("https://checkout.test/session/{}", request.order_id),
        })
    }
}

pub fn test_config(database_url: String) -> AppConfig {
    AppConfig {
        database_url,
        jwt_secret: "integration_test_jwt_secret_that_is_at_least_sixty_four_characters_long_01"
            .to_string(),
        jwt_expiration: 3600,
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "development".to_string(),
        log_level: "warn".to_string(),
        log_json: false,
        auto_migrate: true,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
        db_max_connections: 5,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        db_idle_timeout_secs: 60,
        db_acquire_timeout_secs: 5,
        event_channel_capacity: 64,
        currency: "inr".to_string(),
        frontend_origin: "http://localhost:5173".to_string(),
        stripe_secret_key: None,
        stripe_api_base: "https://api.stripe.com/v1".to_string(),
        payment_webhook_secret: Some("whsec_integration_test".to_string()),
        payment_webhook_tolerance_secs: 300,
        otp_expiration_minutes: 5,
        sms_api_url: None,
        sms_api_key: None,
        api_default_page_size: 20,
        api_max_page_size: 100,
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Arc<AppConfig>,
}

impl TestApp {
    pub async fn spawn() -> TestApp {
        let db_path = std::env::temp_dir().join(format!("cybershop-test-{}.db", Uuid::new_v4()));
        let database_url = format!("sqlite://{}?mode=rwc", db_path.display());

        let config = Arc::new(test_config(database_url));
        let pool = db::establish_connection(&config.database_url)
            .await
            .expect("failed to open test database");
        Migrator::up(&pool, None).await.expect("migrations failed");

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let event_sender = Arc::new(EventSender::new(tx));
        tokio::spawn(process_events(rx));

        let state = AppState::new(
            Arc::new(pool),
            config.clone(),
            event_sender,
            Arc::new(StubProvider),
            Arc::new(LoggingSms),
        );
        let app = build_app(state.clone());

        TestApp { app, state, config }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };

        (status, json)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, serde_json::Value) {
        self.request(Method::GET, path, token, None).await
    }

    pub async fn post(
        &self,
        path: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        self.request(Method::POST, path, token, Some(body)).await
    }

    pub async fn put(
        &self,
        path: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        self.request(Method::PUT, path, token, Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> (StatusCode, serde_json::Value) {
        self.request(Method::DELETE, path, token, None).await
    }

    /// Inserts a user and returns it with a valid bearer token.
    pub async fn seed_user(&self, role: UserRole) -> (UserModel, String) {
        let suffix: u32 = rand::random::<u32>() % 1_000_000;
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            fullname: Set("Asha Rao".to_string()),
            email: Set(None),
            phone: Set(format!("9{:09}", suffix)),
            role: Set(role),
            profile_photo: Set(None),
            is_logged_in: Set(true),
            order_count: Set(0),
            ..Default::default()
        };
        let user = model
            .insert(self.state.db.as_ref())
            .await
            .expect("failed to seed user");
        let token = issue_token(&self.config, &user).expect("failed to issue token");
        (user, token)
    }

    /// Inserts a product with one variant holding the given stock.
    pub async fn seed_product(
        &self,
        title: &str,
        price: Decimal,
        stock: i32,
    ) -> (ProductModel, ProductVariantModel) {
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title.to_string()),
            description: Set(
                "A well rounded phone with a bright display, dependable battery life, \
                 fast charging, and a camera that holds up in low light."
                    .to_string(),
            ),
            base_price: Set(price),
            category: Set("phones".to_string()),
            badge: Set("Best Seller".to_string()),
            discount_percentage: Set(None),
            discounted_price: Set(None),
            ..Default::default()
        };
        let product = product
            .insert(self.state.db.as_ref())
            .await
            .expect("failed to seed product");

        let variant = product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            brand: Set("Cyber".to_string()),
            storage: Set("256GB".to_string()),
            color: Set("Black".to_string()),
            additional_price: Set(Decimal::ZERO),
            stock: Set(stock),
            images: Set(serde_json::json!(["https://img.test/phone.jpg"])),
            screen_type: Set(None),
            cpu: Set(None),
            cores: Set(None),
            main_camera: Set(None),
            front_camera: Set(None),
            battery_capacity: Set(None),
            delivery_time: Set(None),
            guarantee: Set(None),
            ..Default::default()
        };
        let variant = variant
            .insert(self.state.db.as_ref())
            .await
            .expect("failed to seed variant");

        (product, variant)
    }
}

/// Parses a JSON field (string or number) as a `Decimal` for value
/// comparisons independent of serialized scale.
pub fn as_decimal(value: &serde_json::Value) -> Decimal {
    use std::str::FromStr;
    match value {
        serde_json::Value::String(s) => Decimal::from_str(s).expect("not a decimal string"),
        serde_json::Value::Number(n) => {
            Decimal::from_str(&n.to_string()).expect("not a decimal number")
        }
        other => panic!("expected a decimal value, got {}", other),
    }
}

/// Standard checkout body for one product.
pub fn checkout_body(product: &ProductModel, quantity: i32, unit_price: Decimal) -> serde_json::Value {
    serde_json::json!({
        "items": [{
            "product_id": product.id,
            "title": product.title,
            "quantity": quantity,
            "unit_price": unit_price,
            "image": null,
        }],
        "amount": unit_price * Decimal::from(quantity),
        "address": {
            "street": "12 MG Road",
            "city": "Bengaluru",
            "land_mark": "Opposite metro",
            "state": "Karnataka",
            "country": "India",
            "zip_code": "560001",
        },
        "shipping_method": "FreeDelivery",
        "delivery_date": null,
    })
}
