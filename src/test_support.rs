//! Helpers shared by unit tests.

use crate::config::AppConfig;

pub fn test_app_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "unit_test_jwt_secret_that_is_at_least_sixty_four_characters_long_0123456789"
            .to_string(),
        jwt_expiration: 3600,
        host: "127.0.0.1".to_string(),
        port: 8080,
        environment: "development".to_string(),
        log_level: "info".to_string(),
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
        payment_webhook_secret: Some("whsec_test_secret".to_string()),
        payment_webhook_tolerance_secs: 300,
        otp_expiration_minutes: 5,
        sms_api_url: None,
        sms_api_key: None,
        api_default_page_size: 20,
        api_max_page_size: 100,
    }
}
