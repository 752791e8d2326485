use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::events::PaymentEvent;

/// Body POSTed to merchant endpoints.
///
/// Field order is part of the wire contract: merchants verify the signature
/// over these exact bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Event name, e.g. `payment.success`
    pub event: String,

    /// Unix seconds when the event occurred
    pub timestamp: i64,

    pub data: Value,
}

impl WebhookPayload {
    pub fn from_event(event: &PaymentEvent) -> Self {
        Self {
            event: event.kind.as_str().to_string(),
            timestamp: event.occurred_at.unix_timestamp(),
            data: event.data.clone(),
        }
    }

    /// Canonical JSON, computed once per attempt
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
