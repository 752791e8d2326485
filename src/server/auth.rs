use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::models::Merchant;
use crate::server::AppState;
use crate::server::responses::ApiError;

pub const API_KEY_HEADER: &str = "X-Api-Key";
pub const API_SECRET_HEADER: &str = "X-Api-Secret";

/// Merchant identified by the request's API key and secret.
#[derive(Debug, Clone)]
pub struct AuthenticatedMerchant(pub Merchant);

impl FromRequestParts<AppState> for AuthenticatedMerchant {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };

        let (Some(api_key), Some(api_secret)) = (header(API_KEY_HEADER), header(API_SECRET_HEADER))
        else {
            return Err(ApiError::unauthorized("Missing API credentials"));
        };

        match state
            .engine
            .merchants()
            .authenticate(&api_key, &api_secret)
            .await
        {
            Some(merchant) => Ok(Self(merchant)),
            None => {
                tracing::warn!(api_key = %api_key, "Rejected invalid API credentials");
                Err(ApiError::unauthorized("Invalid API credentials"))
            }
        }
    }
}
