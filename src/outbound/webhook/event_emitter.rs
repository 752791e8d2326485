use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use crate::domain::events::PaymentEvent;
use crate::domain::models::DeliveryAttempt;
use crate::domain::ports::MerchantStore;
use crate::outbound::webhook::delivery_scheduler::DeliveryScheduler;
use crate::outbound::webhook::error::WebhookError;

/// Bridges payment events to webhook deliveries.
///
/// Emitting the same event twice delivers it twice; deduplication belongs to
/// the caller.
pub struct EventEmitter {
    merchants: Arc<dyn MerchantStore>,
    scheduler: Arc<DeliveryScheduler>,
}

impl EventEmitter {
    pub fn new(merchants: Arc<dyn MerchantStore>, scheduler: Arc<DeliveryScheduler>) -> Self {
        Self {
            merchants,
            scheduler,
        }
    }

    /// Deliver `event` to every endpoint of its merchant, concurrently.
    ///
    /// Unknown merchants and merchants without an endpoint yield no attempts.
    pub async fn emit(&self, event: &PaymentEvent) -> Result<Vec<DeliveryAttempt>, WebhookError> {
        let Some(merchant) = self.merchants.get(event.merchant_id).await else {
            debug!(merchant_id = %event.merchant_id, event = %event.kind, "Unknown merchant, nothing to deliver");
            return Ok(Vec::new());
        };

        let endpoints = merchant.endpoints();
        if endpoints.is_empty() {
            debug!(
                merchant_id = %merchant.id,
                event = %event.kind,
                "No webhook endpoint configured, skipping"
            );
            return Ok(Vec::new());
        }

        info!(
            event_id = %event.id,
            event = %event.kind,
            merchant_id = %merchant.id,
            endpoints = endpoints.len(),
            "Emitting webhook event"
        );

        join_all(
            endpoints
                .into_iter()
                .map(|endpoint| self.scheduler.deliver(event, endpoint)),
        )
        .await
        .into_iter()
        .collect()
    }
}
