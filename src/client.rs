//! Typed client for the merchant dashboard API.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::DeliveryAttempt;
use crate::domain::ports::{AttemptPage, AttemptQuery, StatusCounts};
use crate::server::{API_KEY_HEADER, API_SECRET_HEADER, ErrorBody};

#[derive(Debug, Error)]
pub enum DashboardClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: status={status}, message={message}")]
    Api { status: StatusCode, message: String },
}

impl DashboardClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DashboardClientError::Api { status, .. } => Some(*status),
            DashboardClientError::Request(e) => e.status(),
        }
    }
}

/// Dashboard API client holding the base URL and merchant credentials.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl DashboardClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// One page of delivery logs
    pub async fn list_deliveries(
        &self,
        query: &AttemptQuery,
    ) -> Result<AttemptPage, DashboardClientError> {
        let request = self.client.get(self.url("/api/v1/webhooks")).query(query);
        self.send(request).await
    }

    pub async fn retry(&self, attempt_id: Uuid) -> Result<DeliveryAttempt, DashboardClientError> {
        let request = self
            .client
            .post(self.url(&format!("/api/v1/webhooks/{attempt_id}/retry")));
        self.send(request).await
    }

    pub async fn stats(&self) -> Result<StatusCounts, DashboardClientError> {
        let request = self.client.get(self.url("/api/v1/webhooks/stats"));
        self.send(request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, DashboardClientError> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .header(API_SECRET_HEADER, &self.api_secret)
            .send()
            .await?;

        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, DashboardClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await?;
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        Err(DashboardClientError::Api { status, message })
    }
}
