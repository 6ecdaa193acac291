//! Payment provider integration.
//!
//! The order workflow only ever sees two things: a [`PaymentProvider`] that
//! turns an order into a hosted checkout URL, and a [`PaymentOutcome`] value
//! reporting how a payment ended. Both the legacy client-driven verify
//! endpoint and the HMAC-verified webhook produce the same `PaymentOutcome`,
//! so swapping the trust boundary does not touch the workflow.

use async_trait::async_trait;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

/// One display line of a provider checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutLineItem {
    pub title: String,
    pub image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// Everything a provider needs to host a checkout page for an order.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub customer_name: String,
    pub line_items: Vec<CheckoutLineItem>,
}

/// Hosted checkout page handle returned by the provider.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Provider-agnostic payment result driving order finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub order_id: Uuid,
    pub success: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError>;
}

/// Stripe hosted-checkout client.
#[derive(Clone)]
pub struct StripeCheckout {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
    currency: String,
    frontend_origin: String,
}

#[derive(Debug, Deserialize)]
struct StripeSessionResponse {
    id: String,
    url: String,
}

impl StripeCheckout {
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let secret_key = config.stripe_secret_key.clone()?;
        Some(Self {
            client: reqwest::Client::new(),
            secret_key,
            api_base: config.stripe_api_base.trim_end_matches('/').to_string(),
            currency: config.currency.clone(),
            frontend_origin: config.frontend_origin.trim_end_matches('/').to_string(),
        })
    }

    /// Converts a decimal price into integer minor currency units.
    fn minor_units(amount: Decimal) -> Result<i64, ServiceError> {
        (amount * Decimal::from(100))
            .round()
            .to_i64()
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!("Amount {} out of range", amount))
            })
    }

    fn redirect_url(&self, order_id: Uuid, success: bool) -> String {
        format!(
            "{}/order/verify?success={}&orderId={}",
            self.frontend_origin, success, order_id
        )
    }
}

#[async_trait]
impl PaymentProvider for StripeCheckout {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            (
                "success_url".into(),
                self.redirect_url(request.order_id, true),
            ),
            (
                "cancel_url".into(),
                self.redirect_url(request.order_id, false),
            ),
            (
                "metadata[order_id]".into(),
                request.order_id.to_string(),
            ),
            ("metadata[user_id]".into(), request.user_id.to_string()),
            (
                "metadata[customer_name]".into(),
                request.customer_name.clone(),
            ),
        ];

        for (i, item) in request.line_items.iter().enumerate() {
            form.push((
                format!("line_items[{}][price_data][currency]", i),
                self.currency.clone(),
            ));
            form.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                item.title.clone(),
            ));
            if let Some(image) = &item.image {
                form.push((
                    format!("line_items[{}][price_data][product_data][images][0]", i),
                    image.clone(),
                ));
            }
            form.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                Self::minor_units(item.unit_price)?.to_string(),
            ));
            form.push((format!("line_items[{}][quantity]", i), item.quantity.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!("Stripe checkout session request failed: {}", e);
                ServiceError::ExternalServiceError(format!("Stripe request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Stripe returned {}: {}", status, body);
            return Err(ServiceError::ExternalServiceError(format!(
                "Stripe returned {}",
                status
            )));
        }

        let session: StripeSessionResponse = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("Invalid Stripe response: {}", e))
        })?;

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }
}

/// Stand-in used when no provider credentials are configured. The COD path
/// keeps working; the online path fails loudly instead of silently.
pub struct UnconfiguredProvider;

#[async_trait]
impl PaymentProvider for UnconfiguredProvider {
    async fn create_checkout_session(
        &self,
        _request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        Err(ServiceError::ExternalServiceError(
            "Online payments are not configured".to_string(),
        ))
    }
}

/// Verifies an inbound webhook signature.
///
/// Accepts either the generic `x-timestamp`/`x-signature` header pair or a
/// Stripe style `Stripe-Signature: t=...,v1=...` header; both sign
/// `"{timestamp}.{raw body}"` with HMAC-SHA256 over the shared secret.
pub fn verify_webhook_signature(
    headers: &HeaderMap,
    payload: &[u8],
    secret: &str,
    tolerance_secs: u64,
) -> bool {
    if let (Some(ts), Some(sig)) = (headers.get("x-timestamp"), headers.get("x-signature")) {
        if let (Ok(ts), Ok(sig)) = (ts.to_str(), sig.to_str()) {
            if let Ok(ts_i) = ts.parse::<i64>() {
                let now = chrono::Utc::now().timestamp();
                if (now - ts_i).unsigned_abs() > tolerance_secs {
                    return false;
                }
            }
            return signature_matches(ts, payload, secret, sig);
        }
    }

    if let Some(sig) = headers.get("stripe-signature").and_then(|h| h.to_str().ok()) {
        let mut ts = "";
        let mut v1 = "";
        for part in sig.split(',') {
            let mut it = part.split('=');
            match (it.next(), it.next()) {
                (Some("t"), Some(val)) => ts = val,
                (Some("v1"), Some(val)) => v1 = val,
                _ => {}
            }
        }
        if !ts.is_empty() && !v1.is_empty() {
            if let Ok(ts_i) = ts.parse::<i64>() {
                let now = chrono::Utc::now().timestamp();
                if (now - ts_i).unsigned_abs() > tolerance_secs {
                    return false;
                }
            }
            return signature_matches(ts, payload, secret, v1);
        }
    }

    false
}

fn signature_matches(ts: &str, payload: &[u8], secret: &str, given: &str) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(ts.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, given)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sign(secret: &str, ts: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.", ts).as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn minor_units_multiplies_by_hundred() {
        assert_eq!(StripeCheckout::minor_units(dec!(499.99)).unwrap(), 49999);
        assert_eq!(StripeCheckout::minor_units(dec!(0.01)).unwrap(), 1);
        assert_eq!(StripeCheckout::minor_units(dec!(1200)).unwrap(), 120000);
    }

    #[test]
    fn stripe_style_signature_verifies() {
        let secret = "whsec_test";
        let body = br#"{"order_id":"abc","success":true}"#;
        let ts = chrono::Utc::now().timestamp();
        let sig = sign(secret, ts, body);

        let mut headers = HeaderMap::new();
        headers.insert(
            "stripe-signature",
            format!("t={},v1={}", ts, sig).parse().unwrap(),
        );

        assert!(verify_webhook_signature(&headers, body, secret, 300));
        assert!(!verify_webhook_signature(&headers, body, "other_secret", 300));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let secret = "whsec_test";
        let body = b"{}";
        let ts = chrono::Utc::now().timestamp() - 3600;
        let sig = sign(secret, ts, body);

        let mut headers = HeaderMap::new();
        headers.insert(
            "stripe-signature",
            format!("t={},v1={}", ts, sig).parse().unwrap(),
        );

        assert!(!verify_webhook_signature(&headers, body, secret, 300));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let secret = "whsec_test";
        let ts = chrono::Utc::now().timestamp();
        let sig = sign(secret, ts, b"original");

        let mut headers = HeaderMap::new();
        headers.insert("x-timestamp", ts.to_string().parse().unwrap());
        headers.insert("x-signature", sig.parse().unwrap());

        assert!(!verify_webhook_signature(&headers, b"tampered", secret, 300));
    }
}
