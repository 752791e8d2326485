use reqwest::{Client, Response, StatusCode, Url};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use super::hmac_signer::SIGNATURE_HEADER;

/// Default bound on a single delivery, connect and response included
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for HTTP client operations
#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Response error: status={status}, body={body}")]
    ResponseError { status: StatusCode, body: String },
}

impl HttpClientError {
    /// HTTP status returned by the endpoint, if it answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            HttpClientError::ResponseError { status, .. } => Some(status.as_u16()),
            _ => None,
        }
    }

    /// Text stored on the attempt: the endpoint's body, or the error itself
    pub fn response_body(&self) -> String {
        match self {
            HttpClientError::ResponseError { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }

    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            HttpClientError::Timeout(timeout)
        } else if err.is_connect() {
            HttpClientError::NetworkError(err.to_string())
        } else {
            HttpClientError::RequestFailed(err.to_string())
        }
    }
}

/// Successful endpoint answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResponse {
    pub status_code: u16,
    pub response_time_ms: u64,
    pub body: String,
}

/// HTTP client wrapper for webhook delivery
pub struct WebhookHttpClient {
    client: Client,
    timeout: Duration,
}

impl WebhookHttpClient {
    /// Create a new HTTP client with the default 10 second timeout
    pub fn new() -> Result<Self, HttpClientError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(format!("PaymentGatewayWebhooks/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpClientError::RequestFailed(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// POST a signed payload.
    ///
    /// Anything but a 2xx answer within the timeout is an error. The whole
    /// exchange is dropped once the timeout elapses, so a late answer is
    /// never observed.
    pub async fn post_signed(
        &self,
        url: &str,
        payload: &str,
        signature: &str,
    ) -> Result<DeliveryResponse, HttpClientError> {
        let url = Url::parse(url).map_err(|e| HttpClientError::InvalidUrl(format!("{url}: {e}")))?;
        debug!(url = %url, "Sending webhook");

        let start = Instant::now();
        let exchange = async {
            let response = self
                .client
                .post(url.clone())
                .header("Content-Type", "application/json")
                .header(SIGNATURE_HEADER, signature)
                .body(payload.to_string())
                .send()
                .await
                .map_err(|e| HttpClientError::from_reqwest(e, self.timeout))?;

            let status = response.status();
            let body = self.read_response_body(response).await?;
            Ok::<_, HttpClientError>((status, body))
        };

        let (status, body) = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result.inspect_err(|e| {
                warn!(url = %url, error = %e, "Webhook request failed");
            })?,
            Err(_) => {
                warn!(url = %url, timeout = ?self.timeout, "Webhook request timed out");
                return Err(HttpClientError::Timeout(self.timeout));
            }
        };

        let response_time_ms = start.elapsed().as_millis() as u64;
        debug!(
            url = %url,
            status = %status.as_u16(),
            response_time_ms = %response_time_ms,
            "Webhook response received"
        );

        if !status.is_success() {
            return Err(HttpClientError::ResponseError { status, body });
        }

        Ok(DeliveryResponse {
            status_code: status.as_u16(),
            response_time_ms,
            body,
        })
    }

    /// Read response body with size limit
    ///
    /// Chunks past the limit are never buffered.
    async fn read_response_body(&self, mut response: Response) -> Result<String, HttpClientError> {
        // Limit response body size to 64KB
        const MAX_BODY_SIZE: usize = 64 * 1024;

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            HttpClientError::RequestFailed(format!("Failed to read response body: {e}"))
        })? {
            let remaining = MAX_BODY_SIZE - bytes.len();
            if chunk.len() > remaining {
                bytes.extend_from_slice(&chunk[..remaining]);
                warn!(max_size = MAX_BODY_SIZE, "Response body too large, truncating");
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Get configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
