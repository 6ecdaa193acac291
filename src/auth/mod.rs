//! Authentication and authorization.
//!
//! Login is phone OTP based: the user service verifies a code and calls
//! [`issue_token`]; every protected handler then receives an explicit
//! [`AuthenticatedUser`] principal through the axum extractor and passes it
//! into the services. Nothing reads the caller identity from ambient state.

use async_trait::async_trait;
use axum::{
    extract::FromRef,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::{UserModel, UserRole};
use crate::errors::ServiceError;
use crate::AppState;

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub phone: String,
    pub role: String,
    /// JWT ID (unique identifier for this token)
    pub jti: String,
    /// Issued at time
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
}

/// Authenticated principal extracted from the JWT token and passed
/// explicitly into every workflow call.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub phone: String,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admin gate used by the catalog, offer, and order administration
    /// surfaces.
    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Administrator access required".to_string(),
            ))
        }
    }
}

/// Generates a signed JWT for the given user
pub fn issue_token(config: &AppConfig, user: &UserModel) -> Result<String, ServiceError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        phone: user.phone.clone(),
        role: match user.role {
            UserRole::Admin => "admin".to_string(),
            UserRole::User => "user".to_string(),
        },
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: now.timestamp() + config.jwt_expiration as i64,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ServiceError::InternalError(format!("Failed to sign token: {}", e)))
}

/// Validates a JWT and returns its claims
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ServiceError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| ServiceError::Unauthorized(format!("Invalid token: {}", e)))
}

fn principal_from_claims(claims: Claims) -> Result<AuthenticatedUser, ServiceError> {
    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ServiceError::Unauthorized("Invalid subject claim".to_string()))?;
    let role = match claims.role.as_str() {
        "admin" => UserRole::Admin,
        "user" => UserRole::User,
        other => {
            return Err(ServiceError::Unauthorized(format!(
                "Unknown role claim: {}",
                other
            )))
        }
    };

    Ok(AuthenticatedUser {
        id,
        phone: claims.phone,
        role,
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("Missing Authorization header".to_string())
            })?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::Unauthorized("Expected Bearer token".to_string()))?;

        let claims = decode_token(&app_state.config.jwt_secret, token)?;
        principal_from_claims(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(role: UserRole) -> UserModel {
        UserModel {
            id: Uuid::new_v4(),
            fullname: "Asha Rao".to_string(),
            email: Some("asha@example.com".to_string()),
            phone: "9876543210".to_string(),
            role,
            profile_photo: None,
            is_logged_in: true,
            order_count: 0,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn test_config() -> AppConfig {
        let mut cfg = crate::test_support::test_app_config();
        cfg.jwt_expiration = 3600;
        cfg
    }

    #[test]
    fn token_round_trip_preserves_principal() {
        let config = test_config();
        let user = test_user(UserRole::Admin);

        let token = issue_token(&config, &user).unwrap();
        let claims = decode_token(&config.jwt_secret, &token).unwrap();
        let principal = principal_from_claims(claims).unwrap();

        assert_eq!(principal.id, user.id);
        assert_eq!(principal.phone, user.phone);
        assert!(principal.is_admin());
    }

    #[test]
    fn decode_rejects_wrong_secret() {
        let config = test_config();
        let token = issue_token(&config, &test_user(UserRole::User)).unwrap();
        let err = decode_token("another_secret_that_is_not_the_signing_one", &token).unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[test]
    fn require_admin_rejects_plain_users() {
        let principal = AuthenticatedUser {
            id: Uuid::new_v4(),
            phone: "9876543210".to_string(),
            role: UserRole::User,
        };
        assert!(matches!(
            principal.require_admin(),
            Err(ServiceError::Forbidden(_))
        ));
    }
}
