use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Longest response body (in characters) kept on a delivery attempt.
pub const MAX_RESPONSE_BODY_CHARS: usize = 255;

/// Merchant-owned webhook target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookEndpoint {
    pub url: String,

    /// Shared secret used only to sign payloads
    #[serde(skip_serializing, default)]
    pub secret: String,
}

impl WebhookEndpoint {
    pub fn new(url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            secret: secret.into(),
        }
    }
}

/// Account owning API credentials and webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Merchant {
    pub id: Uuid,

    pub name: String,

    pub api_key: String,

    #[serde(skip_serializing, default)]
    pub api_secret: String,

    pub webhook: Option<WebhookEndpoint>,
}

impl Merchant {
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            webhook: None,
        }
    }

    pub fn with_webhook(mut self, endpoint: WebhookEndpoint) -> Self {
        self.webhook = Some(endpoint);
        self
    }

    /// Endpoints an event for this merchant fans out to.
    ///
    /// A merchant currently owns at most one endpoint.
    pub fn endpoints(&self) -> Vec<&WebhookEndpoint> {
        self.webhook.iter().collect()
    }

    pub fn credentials_match(&self, api_key: &str, api_secret: &str) -> bool {
        self.api_key == api_key && self.api_secret == api_secret
    }
}

/// Status of a delivery attempt as shown in the delivery logs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,

    Success,

    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record of an outbound webhook POST and its outcome.
///
/// A record is created `pending` before any network call and moved to a
/// terminal status by the delivery scheduler. Once `success` it never changes
/// again; `failed` records only change through the retry path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryAttempt {
    pub id: Uuid,

    pub merchant_id: Uuid,

    pub event_id: Uuid,

    /// Event name, e.g. `payment.success`
    pub event: String,

    pub endpoint_url: String,

    /// Canonical JSON body, signed and sent verbatim on every try
    pub payload: String,

    pub status: DeliveryStatus,

    pub attempts: u32,

    pub response_code: Option<u16>,

    pub response_body: Option<String>,

    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_attempt_at: Option<OffsetDateTime>,

    #[serde(default, with = "time::serde::rfc3339::option")]
    pub next_retry_at: Option<OffsetDateTime>,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl DeliveryAttempt {
    /// Create a pending attempt with a fresh id.
    pub fn pending(
        merchant_id: Uuid,
        event_id: Uuid,
        event: impl Into<String>,
        endpoint_url: impl Into<String>,
        payload: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            event_id,
            event: event.into(),
            endpoint_url: endpoint_url.into(),
            payload,
            status: DeliveryStatus::Pending,
            attempts: 0,
            response_code: None,
            response_body: None,
            last_attempt_at: None,
            next_retry_at: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Start a new HTTP try: back to pending, one more attempt on the counter.
    pub fn begin(mut self, now: OffsetDateTime) -> Self {
        self.status = DeliveryStatus::Pending;
        self.attempts += 1;
        self.last_attempt_at = Some(now);
        self.next_retry_at = None;
        self
    }

    /// Mark as succeeded
    pub fn succeeded(mut self, response_code: u16, response_body: String) -> Self {
        self.status = DeliveryStatus::Success;
        self.response_code = Some(response_code);
        self.response_body = Some(truncate_body(response_body));
        self.next_retry_at = None;
        self
    }

    /// Mark as failed, optionally scheduling an automatic retry
    pub fn failed(
        mut self,
        response_code: Option<u16>,
        response_body: String,
        next_retry_at: Option<OffsetDateTime>,
    ) -> Self {
        self.status = DeliveryStatus::Failed;
        self.response_code = response_code;
        self.response_body = Some(truncate_body(response_body));
        self.next_retry_at = next_retry_at;
        self
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == DeliveryStatus::Success
    }
}

fn truncate_body(body: String) -> String {
    if body.chars().count() <= MAX_RESPONSE_BODY_CHARS {
        body
    } else {
        body.chars().take(MAX_RESPONSE_BODY_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_attempt() -> DeliveryAttempt {
        DeliveryAttempt::pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "payment.success",
            "https://merchant.example.com/webhook",
            r#"{"event":"payment.success"}"#.to_string(),
        )
    }

    #[test]
    fn test_pending_attempt_defaults() {
        let attempt = make_attempt();

        assert_eq!(attempt.status, DeliveryStatus::Pending);
        assert_eq!(attempt.attempts, 0);
        assert!(attempt.response_code.is_none());
        assert!(attempt.last_attempt_at.is_none());
    }

    #[test]
    fn test_begin_increments_attempts() {
        let now = OffsetDateTime::now_utc();
        let attempt = make_attempt().begin(now).begin(now);

        assert_eq!(attempt.attempts, 2);
        assert_eq!(attempt.status, DeliveryStatus::Pending);
        assert_eq!(attempt.last_attempt_at, Some(now));
    }

    #[test]
    fn test_failed_then_begin_clears_next_retry() {
        let now = OffsetDateTime::now_utc();
        let attempt = make_attempt()
            .begin(now)
            .failed(Some(500), "boom".to_string(), Some(now));
        assert_eq!(attempt.next_retry_at, Some(now));

        let attempt = attempt.begin(now);
        assert!(attempt.next_retry_at.is_none());
        assert_eq!(attempt.status, DeliveryStatus::Pending);
    }

    #[test]
    fn test_response_body_is_truncated() {
        let attempt = make_attempt().failed(Some(500), "x".repeat(1000), None);

        let body = attempt.response_body.unwrap_or_default();
        assert_eq!(body.len(), MAX_RESPONSE_BODY_CHARS);
    }

    #[test]
    fn test_status_serialization() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&DeliveryStatus::Pending)?, r#""pending""#);
        assert_eq!(serde_json::to_string(&DeliveryStatus::Success)?, r#""success""#);
        assert_eq!(serde_json::to_string(&DeliveryStatus::Failed)?, r#""failed""#);
        Ok(())
    }

    #[test]
    fn test_endpoint_secret_is_not_serialized() -> Result<(), serde_json::Error> {
        let endpoint = WebhookEndpoint::new("https://merchant.example.com/hook", "whsec_123");
        let json = serde_json::to_string(&endpoint)?;

        assert!(!json.contains("whsec_123"));
        assert!(json.contains("https://merchant.example.com/hook"));
        Ok(())
    }

    #[test]
    fn test_merchant_endpoints() {
        let merchant = Merchant::new(Uuid::new_v4(), "Acme", "key", "secret");
        assert!(merchant.endpoints().is_empty());

        let merchant = merchant.with_webhook(WebhookEndpoint::new("https://a.example", "s"));
        assert_eq!(merchant.endpoints().len(), 1);
        assert!(merchant.credentials_match("key", "secret"));
        assert!(!merchant.credentials_match("key", "wrong"));
    }
}
