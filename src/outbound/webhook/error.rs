use thiserror::Error;
use uuid::Uuid;

use crate::domain::ports::LedgerError;
use crate::outbound::webhook::hmac_signer::SignerError;

/// Errors surfaced by the webhook engine to its callers.
///
/// Transport failures are not here: they end up on the attempt as `failed`.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Delivery attempt not found: {0}")]
    NotFound(Uuid),

    #[error("Delivery attempt {0} already succeeded")]
    AlreadySucceeded(Uuid),

    #[error("Delivery attempt {id} reached the limit of {max} attempts")]
    AttemptLimitExceeded { id: Uuid, max: u32 },

    #[error("A delivery for attempt {0} is already in progress")]
    RetryInProgress(Uuid),

    #[error("Merchant not found: {0}")]
    MerchantNotFound(Uuid),

    #[error("Merchant {0} has no webhook endpoint configured")]
    EndpointNotConfigured(Uuid),

    #[error("Failed to sign webhook payload: {0}")]
    SigningFailure(#[from] SignerError),

    #[error("Invalid webhook endpoint: {0}")]
    InvalidEndpoint(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Failed to serialise webhook payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Delivery task aborted: {0}")]
    DeliveryTask(#[from] tokio::task::JoinError),

    #[error("Failed to initialise webhook engine: {0}")]
    Initialisation(String),
}
