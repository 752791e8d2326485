use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use uuid::Uuid;

/// Kinds of payment facts that produce webhook notifications
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventKind {
    #[serde(rename = "payment.success")]
    PaymentSuccess,

    #[serde(rename = "payment.failed")]
    PaymentFailed,

    #[serde(rename = "payment.captured")]
    PaymentCaptured,

    #[serde(rename = "refund.processed")]
    RefundProcessed,

    /// Sent from the dashboard to check an endpoint
    #[serde(rename = "webhook.test")]
    WebhookTest,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PaymentSuccess => "payment.success",
            EventKind::PaymentFailed => "payment.failed",
            EventKind::PaymentCaptured => "payment.captured",
            EventKind::RefundProcessed => "refund.processed",
            EventKind::WebhookTest => "webhook.test",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fact from the payment domain owned by one merchant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentEvent {
    pub id: Uuid,

    pub merchant_id: Uuid,

    pub kind: EventKind,

    /// Event body, e.g. `{"payment": {...}}`
    pub data: Value,

    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
}

impl PaymentEvent {
    pub fn new(merchant_id: Uuid, kind: EventKind, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            kind,
            data,
            occurred_at: OffsetDateTime::now_utc(),
        }
    }

    /// Payment outcome event; `payment` is nested under `data.payment`
    pub fn payment(merchant_id: Uuid, succeeded: bool, payment: Value) -> Self {
        let kind = if succeeded {
            EventKind::PaymentSuccess
        } else {
            EventKind::PaymentFailed
        };
        Self::new(merchant_id, kind, json!({ "payment": payment }))
    }

    pub fn refund_processed(merchant_id: Uuid, refund: Value) -> Self {
        Self::new(merchant_id, EventKind::RefundProcessed, json!({ "refund": refund }))
    }

    pub fn test(merchant_id: Uuid) -> Self {
        Self::new(
            merchant_id,
            EventKind::WebhookTest,
            json!({ "message": "This is a test webhook from the payment gateway" }),
        )
    }
}
