//! Shared-key authorization
//!
//! Every route except the upload PUT (which is authorized by token
//! possession alone) requires the configured static key: the `X-API-Key`
//! header for API calls, or a `key` query parameter for browser routes.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::AppState;

/// Extractor that rejects requests without a valid `X-API-Key` header
pub struct RequireApiKey;

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts.headers.get("x-api-key").and_then(|v| v.to_str().ok());
        match presented {
            Some(key) if key == state.config.api_key => Ok(RequireApiKey),
            _ => Err(ApiError::Unauthorized),
        }
    }
}

/// Key check for browser routes, where the key arrives as a query
/// parameter (or the header, for API clients reusing the same route)
pub fn check_key(state: &AppState, presented: Option<&str>) -> Result<(), ApiError> {
    match presented {
        Some(key) if key == state.config.api_key => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}
