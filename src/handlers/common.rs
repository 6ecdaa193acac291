//! Shared plumbing for the HTTP layer: response envelope, input validation,
//! pagination.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use validator::Validate;

use crate::config::AppConfig;
use crate::errors::ServiceError;

/// Uniform success envelope; errors go through `ServiceError`'s
/// `IntoResponse` instead.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Response {
        (StatusCode::OK, Json(Self { success: true, data })).into_response()
    }

    pub fn created(data: T) -> Response {
        (StatusCode::CREATED, Json(Self { success: true, data })).into_response()
    }
}

/// 204 for deletes and other bodyless successes.
pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Runs `validator` constraints on a deserialized payload.
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input.validate().map_err(ServiceError::from)
}

#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl PaginationParams {
    /// Resolves page/per_page against configured defaults and caps.
    pub fn resolve(&self, config: &AppConfig) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(config.api_default_page_size)
            .clamp(1, config.api_max_page_size);
        (page, per_page)
    }
}

/// Listing envelope carrying the total row count for client paging.
#[derive(Debug, Serialize)]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_to_configured_bounds() {
        let config = crate::test_support::test_app_config();

        let default = PaginationParams::default().resolve(&config);
        assert_eq!(default, (1, config.api_default_page_size));

        let oversized = PaginationParams {
            page: Some(3),
            per_page: Some(10_000),
        }
        .resolve(&config);
        assert_eq!(oversized, (3, config.api_max_page_size));

        let zeroed = PaginationParams {
            page: Some(0),
            per_page: Some(0),
        }
        .resolve(&config);
        assert_eq!(zeroed, (1, 1));
    }
}
