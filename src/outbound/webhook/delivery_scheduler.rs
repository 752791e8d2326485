use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::domain::events::PaymentEvent;
use crate::domain::models::{DeliveryAttempt, WebhookEndpoint};
use crate::domain::ports::AttemptLedger;
use crate::outbound::webhook::error::WebhookError;
use crate::outbound::webhook::hmac_signer;
use crate::outbound::webhook::http_client::WebhookHttpClient;
use crate::outbound::webhook::in_flight::{InFlight, InFlightGuard};
use crate::outbound::webhook::retry_strategy::RetryStrategy;
use crate::outbound::webhook::schemas::WebhookPayload;

/// Performs signed HTTP deliveries and records every outcome in the ledger.
///
/// Each call is independent: no lock is held while the request is in flight,
/// and transport failures become `failed` attempts instead of errors. The only
/// errors returned are signing, storage and task failures.
pub struct DeliveryScheduler {
    ledger: Arc<dyn AttemptLedger>,

    /// HTTP client reused across all requests.
    http_client: Arc<WebhookHttpClient>,

    retry_strategy: RetryStrategy,

    in_flight: InFlight,
}

impl DeliveryScheduler {
    pub fn new(
        ledger: Arc<dyn AttemptLedger>,
        http_client: Arc<WebhookHttpClient>,
        retry_strategy: RetryStrategy,
    ) -> Self {
        Self {
            ledger,
            http_client,
            retry_strategy,
            in_flight: InFlight::new(),
        }
    }

    /// Deliver `event` to `endpoint` as a brand new attempt.
    ///
    /// The attempt is in the ledger as `pending` before the network is touched.
    pub async fn deliver(
        &self,
        event: &PaymentEvent,
        endpoint: &WebhookEndpoint,
    ) -> Result<DeliveryAttempt, WebhookError> {
        let payload = WebhookPayload::from_event(event).to_json()?;
        let attempt = DeliveryAttempt::pending(
            event.merchant_id,
            event.id,
            event.kind.as_str(),
            endpoint.url.clone(),
            payload,
        );

        // Fresh id, nobody else can hold it
        let guard = self
            .in_flight
            .claim(attempt.id)
            .ok_or(WebhookError::RetryInProgress(attempt.id))?;

        self.ledger.append(attempt.clone()).await?;
        debug!(
            attempt_id = %attempt.id,
            event_id = %event.id,
            event = %attempt.event,
            "Delivery attempt created"
        );

        self.dispatch(attempt, endpoint, guard).await
    }

    /// Re-send a stored attempt's payload to the merchant's current endpoint.
    ///
    /// The caller must already hold the attempt's in-flight claim.
    pub async fn redeliver(
        &self,
        mut attempt: DeliveryAttempt,
        endpoint: &WebhookEndpoint,
        guard: InFlightGuard,
    ) -> Result<DeliveryAttempt, WebhookError> {
        attempt.endpoint_url = endpoint.url.clone();
        self.dispatch(attempt, endpoint, guard).await
    }

    async fn dispatch(
        &self,
        attempt: DeliveryAttempt,
        endpoint: &WebhookEndpoint,
        guard: InFlightGuard,
    ) -> Result<DeliveryAttempt, WebhookError> {
        let task = Dispatch {
            ledger: self.ledger.clone(),
            http_client: self.http_client.clone(),
            retry_strategy: self.retry_strategy.clone(),
        };
        let endpoint = endpoint.clone();

        // Detached: the attempt reaches a terminal state even if the caller is dropped
        let handle = tokio::spawn(async move {
            let _guard = guard;
            task.run(attempt, &endpoint).await
        });
        handle.await?
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub fn retry_strategy(&self) -> &RetryStrategy {
        &self.retry_strategy
    }
}

/// One signed POST plus its ledger bookkeeping, owned by a spawned task.
struct Dispatch {
    ledger: Arc<dyn AttemptLedger>,
    http_client: Arc<WebhookHttpClient>,
    retry_strategy: RetryStrategy,
}

impl Dispatch {
    async fn run(
        &self,
        attempt: DeliveryAttempt,
        endpoint: &WebhookEndpoint,
    ) -> Result<DeliveryAttempt, WebhookError> {
        let attempt = attempt.begin(OffsetDateTime::now_utc());

        let signature = match hmac_signer::sign(&attempt.payload, &endpoint.secret) {
            Ok(signature) => signature,
            Err(e) => {
                error!(attempt_id = %attempt.id, error = %e, "Cannot sign webhook payload");
                let failed = attempt.failed(None, e.to_string(), None);
                self.ledger.update(&failed).await?;
                return Err(e.into());
            }
        };
        self.ledger.update(&attempt).await?;

        let result = self
            .http_client
            .post_signed(&attempt.endpoint_url, &attempt.payload, &signature)
            .await;

        let attempt = match result {
            Ok(response) => {
                info!(
                    attempt_id = %attempt.id,
                    event = %attempt.event,
                    attempt = attempt.attempts,
                    status_code = response.status_code,
                    response_time_ms = response.response_time_ms,
                    "Webhook delivered successfully"
                );
                attempt.succeeded(response.status_code, response.body)
            }
            Err(e) => {
                let status_code = e.status_code();
                let retryable =
                    status_code.is_none_or(|code| self.retry_strategy.should_retry_status(code));
                let next_retry_at = retryable
                    .then(|| self.retry_strategy.next_delay(attempt.attempts))
                    .flatten()
                    .map(|delay| OffsetDateTime::now_utc() + delay);

                if let Some(at) = next_retry_at {
                    warn!(
                        attempt_id = %attempt.id,
                        attempt = attempt.attempts,
                        max_attempts = self.retry_strategy.max_attempts(),
                        next_retry_at = %at,
                        error = %e,
                        "Webhook delivery failed, will retry"
                    );
                } else {
                    error!(
                        attempt_id = %attempt.id,
                        attempt = attempt.attempts,
                        error = %e,
                        "Webhook delivery failed, no automatic retry"
                    );
                }

                attempt.failed(status_code, e.response_body(), next_retry_at)
            }
        };

        self.ledger.update(&attempt).await?;
        Ok(attempt)
    }
}
