use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tracing::info;
use uuid::Uuid;

use crate::config::WebhookConfig;
use crate::domain::events::PaymentEvent;
use crate::domain::models::{DeliveryAttempt, Merchant, WebhookEndpoint};
use crate::domain::ports::{AttemptLedger, AttemptPage, AttemptQuery, MerchantStore, StatusCounts};
use crate::infrastructure::{InMemoryAttemptLedger, InMemoryMerchantStore};
use crate::outbound::webhook::delivery_scheduler::DeliveryScheduler;
use crate::outbound::webhook::error::WebhookError;
use crate::outbound::webhook::event_emitter::EventEmitter;
use crate::outbound::webhook::http_client::WebhookHttpClient;
use crate::outbound::webhook::retry_controller::RetryController;
use crate::outbound::webhook::retry_strategy::RetryStrategy;
use crate::outbound::webhook::retry_worker::RetryWorker;

/// Entry point to webhook delivery: emission, retries, logs and endpoint
/// settings, wired over one ledger and one merchant store.
pub struct WebhookEngine {
    ledger: Arc<dyn AttemptLedger>,
    merchants: Arc<dyn MerchantStore>,
    scheduler: Arc<DeliveryScheduler>,
    controller: Arc<RetryController>,
    emitter: EventEmitter,
}

impl WebhookEngine {
    pub fn new(
        ledger: Arc<dyn AttemptLedger>,
        merchants: Arc<dyn MerchantStore>,
        http_client: WebhookHttpClient,
        retry_strategy: RetryStrategy,
    ) -> Self {
        let scheduler = Arc::new(DeliveryScheduler::new(
            ledger.clone(),
            Arc::new(http_client),
            retry_strategy,
        ));
        let controller = Arc::new(RetryController::new(
            ledger.clone(),
            merchants.clone(),
            scheduler.clone(),
        ));
        let emitter = EventEmitter::new(merchants.clone(), scheduler.clone());

        Self {
            ledger,
            merchants,
            scheduler,
            controller,
            emitter,
        }
    }

    pub fn from_config(
        config: &WebhookConfig,
        ledger: Arc<dyn AttemptLedger>,
        merchants: Arc<dyn MerchantStore>,
    ) -> Result<Self, WebhookError> {
        let http_client = WebhookHttpClient::with_timeout(config.timeout())
            .map_err(|e| WebhookError::Initialisation(e.to_string()))?;

        Ok(Self::new(
            ledger,
            merchants,
            http_client,
            config.retry_strategy(),
        ))
    }

    /// Engine over fresh in-memory stores
    pub fn in_memory(config: &WebhookConfig) -> Result<Self, WebhookError> {
        Self::from_config(
            config,
            Arc::new(InMemoryAttemptLedger::new()),
            Arc::new(InMemoryMerchantStore::new()),
        )
    }

    pub async fn emit(&self, event: &PaymentEvent) -> Result<Vec<DeliveryAttempt>, WebhookError> {
        self.emitter.emit(event).await
    }

    pub async fn retry(&self, attempt_id: Uuid) -> Result<DeliveryAttempt, WebhookError> {
        self.controller.retry(attempt_id).await
    }

    pub async fn retry_for_merchant(
        &self,
        merchant_id: Uuid,
        attempt_id: Uuid,
    ) -> Result<DeliveryAttempt, WebhookError> {
        self.controller
            .retry_for_merchant(merchant_id, attempt_id)
            .await
    }

    pub async fn list(
        &self,
        merchant_id: Uuid,
        query: &AttemptQuery,
    ) -> Result<AttemptPage, WebhookError> {
        Ok(self.ledger.list(merchant_id, query).await?)
    }

    pub async fn stats(&self, merchant_id: Uuid) -> Result<StatusCounts, WebhookError> {
        Ok(self.ledger.count_by_status(merchant_id).await?)
    }

    /// Set the merchant's endpoint URL.
    ///
    /// Without an explicit secret the current one is kept, or a new one is
    /// generated for a first-time setup.
    pub async fn configure_endpoint(
        &self,
        merchant_id: Uuid,
        url: &str,
        secret: Option<String>,
    ) -> Result<Merchant, WebhookError> {
        validate_endpoint_url(url)?;

        let merchant = self
            .merchants
            .get(merchant_id)
            .await
            .ok_or(WebhookError::MerchantNotFound(merchant_id))?;

        let secret = secret
            .filter(|s| !s.is_empty())
            .or_else(|| merchant.webhook.map(|w| w.secret))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(generate_secret);

        self.merchants
            .set_endpoint(merchant_id, WebhookEndpoint::new(url, secret))
            .await
            .ok_or(WebhookError::MerchantNotFound(merchant_id))
    }

    /// Replace the signing secret; the new value is only ever returned here
    pub async fn regenerate_secret(&self, merchant_id: Uuid) -> Result<String, WebhookError> {
        let endpoint = self
            .merchants
            .get(merchant_id)
            .await
            .ok_or(WebhookError::MerchantNotFound(merchant_id))?
            .webhook
            .ok_or(WebhookError::EndpointNotConfigured(merchant_id))?;

        let secret = generate_secret();
        self.merchants
            .set_endpoint(merchant_id, WebhookEndpoint::new(endpoint.url, secret.clone()))
            .await
            .ok_or(WebhookError::MerchantNotFound(merchant_id))?;

        info!(merchant_id = %merchant_id, "Webhook secret regenerated");
        Ok(secret)
    }

    /// Deliver a `webhook.test` event to the merchant's endpoint
    pub async fn send_test(&self, merchant_id: Uuid) -> Result<Vec<DeliveryAttempt>, WebhookError> {
        let merchant = self
            .merchants
            .get(merchant_id)
            .await
            .ok_or(WebhookError::MerchantNotFound(merchant_id))?;
        if merchant.webhook.is_none() {
            return Err(WebhookError::EndpointNotConfigured(merchant_id));
        }

        self.emit(&PaymentEvent::test(merchant_id)).await
    }

    /// Background retry worker sharing this engine's controller
    pub fn retry_worker(&self, poll_interval: Duration) -> Arc<RetryWorker> {
        Arc::new(RetryWorker::new(
            self.ledger.clone(),
            self.controller.clone(),
            self.scheduler.retry_strategy().max_attempts(),
            poll_interval,
        ))
    }

    pub fn ledger(&self) -> &Arc<dyn AttemptLedger> {
        &self.ledger
    }

    pub fn merchants(&self) -> &Arc<dyn MerchantStore> {
        &self.merchants
    }

    pub fn retry_strategy(&self) -> &RetryStrategy {
        self.scheduler.retry_strategy()
    }
}

fn validate_endpoint_url(url: &str) -> Result<(), WebhookError> {
    let parsed = Url::parse(url).map_err(|e| WebhookError::InvalidEndpoint(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        _ => Err(WebhookError::InvalidEndpoint(format!(
            "{url}: only http and https URLs are supported"
        ))),
    }
}

fn generate_secret() -> String {
    format!("whsec_{}", Uuid::new_v4().simple())
}
