use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::models::DeliveryAttempt;
use crate::domain::ports::{AttemptLedger, MerchantStore};
use crate::outbound::webhook::delivery_scheduler::DeliveryScheduler;
use crate::outbound::webhook::error::WebhookError;

/// Validates and runs retries of failed attempts.
///
/// A retry re-sends the stored payload on the same ledger record. At most one
/// try per attempt id runs at any time.
pub struct RetryController {
    ledger: Arc<dyn AttemptLedger>,
    merchants: Arc<dyn MerchantStore>,
    scheduler: Arc<DeliveryScheduler>,
}

impl RetryController {
    pub fn new(
        ledger: Arc<dyn AttemptLedger>,
        merchants: Arc<dyn MerchantStore>,
        scheduler: Arc<DeliveryScheduler>,
    ) -> Self {
        Self {
            ledger,
            merchants,
            scheduler,
        }
    }

    /// Retry any attempt by id
    pub async fn retry(&self, id: Uuid) -> Result<DeliveryAttempt, WebhookError> {
        self.retry_scoped(None, id).await
    }

    /// Retry an attempt owned by `merchant_id`; other merchants' attempts
    /// look like they do not exist.
    pub async fn retry_for_merchant(
        &self,
        merchant_id: Uuid,
        id: Uuid,
    ) -> Result<DeliveryAttempt, WebhookError> {
        self.retry_scoped(Some(merchant_id), id).await
    }

    async fn retry_scoped(
        &self,
        owner: Option<Uuid>,
        id: Uuid,
    ) -> Result<DeliveryAttempt, WebhookError> {
        // Claim before reading so two retries cannot both pass validation
        let Some(guard) = self.scheduler.in_flight().claim(id) else {
            warn!(attempt_id = %id, "Retry rejected, delivery already in progress");
            return Err(WebhookError::RetryInProgress(id));
        };

        let attempt = self
            .ledger
            .get(id)
            .await?
            .filter(|a| owner.is_none_or(|merchant_id| a.merchant_id == merchant_id))
            .ok_or(WebhookError::NotFound(id))?;

        if attempt.is_succeeded() {
            return Err(WebhookError::AlreadySucceeded(id));
        }

        let max = self.scheduler.retry_strategy().max_attempts();
        if attempt.attempts >= max {
            return Err(WebhookError::AttemptLimitExceeded { id, max });
        }

        let endpoint = self
            .merchants
            .get(attempt.merchant_id)
            .await
            .and_then(|m| m.webhook)
            .ok_or(WebhookError::EndpointNotConfigured(attempt.merchant_id))?;

        info!(
            attempt_id = %id,
            attempt = attempt.attempts + 1,
            max_attempts = max,
            "Retrying webhook delivery"
        );
        self.scheduler.redeliver(attempt, &endpoint, guard).await
    }
}
