use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::{DeliveryAttempt, WebhookEndpoint};
use crate::domain::ports::{AttemptPage, AttemptQuery, StatusCounts};
use crate::server::AppState;
use crate::server::auth::AuthenticatedMerchant;
use crate::server::responses::{ApiError, ApiResult};

/// Body of `PUT /api/v1/webhooks/endpoint`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointRequest {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretResponse {
    pub secret: String,
}

/// Delivery logs, newest first
pub async fn list_deliveries(
    State(state): State<AppState>,
    AuthenticatedMerchant(merchant): AuthenticatedMerchant,
    query: Result<Query<AttemptQuery>, QueryRejection>,
) -> ApiResult<Json<AttemptPage>> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let page = state.engine.list(merchant.id, &query).await?;
    Ok(Json(page))
}

pub async fn retry_delivery(
    State(state): State<AppState>,
    AuthenticatedMerchant(merchant): AuthenticatedMerchant,
    Path(id): Path<String>,
) -> ApiResult<Json<DeliveryAttempt>> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::bad_request(format!("Invalid delivery id: {id}")))?;

    let attempt = state.engine.retry_for_merchant(merchant.id, id).await?;
    Ok(Json(attempt))
}

pub async fn delivery_stats(
    State(state): State<AppState>,
    AuthenticatedMerchant(merchant): AuthenticatedMerchant,
) -> ApiResult<Json<StatusCounts>> {
    Ok(Json(state.engine.stats(merchant.id).await?))
}

pub async fn configure_endpoint(
    State(state): State<AppState>,
    AuthenticatedMerchant(merchant): AuthenticatedMerchant,
    body: Result<Json<EndpointRequest>, JsonRejection>,
) -> ApiResult<Json<WebhookEndpoint>> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let updated = state
        .engine
        .configure_endpoint(merchant.id, &request.url, request.secret)
        .await?;
    updated
        .webhook
        .map(Json)
        .ok_or_else(|| ApiError::internal("Webhook endpoint was not stored"))
}

pub async fn regenerate_secret(
    State(state): State<AppState>,
    AuthenticatedMerchant(merchant): AuthenticatedMerchant,
) -> ApiResult<Json<SecretResponse>> {
    let secret = state.engine.regenerate_secret(merchant.id).await?;
    Ok(Json(SecretResponse { secret }))
}

pub async fn send_test_webhook(
    State(state): State<AppState>,
    AuthenticatedMerchant(merchant): AuthenticatedMerchant,
) -> ApiResult<Json<Vec<DeliveryAttempt>>> {
    Ok(Json(state.engine.send_test(merchant.id).await?))
}
