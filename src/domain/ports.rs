/*
   This module specifies the API by which the webhook engine reaches its storage.
*/

use crate::domain::models::{DeliveryAttempt, DeliveryStatus, Merchant, WebhookEndpoint};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_PAGE_LIMIT: usize = 10;
pub const MAX_PAGE_LIMIT: usize = 100;

/// Error type for attempt ledger operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Delivery attempt already recorded: {0}")]
    DuplicateId(Uuid),

    #[error("Delivery attempt not found: {0}")]
    NotFound(Uuid),

    #[error("Delivery attempt {0} already succeeded and cannot be modified")]
    Immutable(Uuid),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Filter and pagination for delivery log listings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
}

impl AttemptQuery {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_status(mut self, status: DeliveryStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Limit clamped to `1..=MAX_PAGE_LIMIT`
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn effective_offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

/// One page of delivery attempts, newest first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptPage {
    pub data: Vec<DeliveryAttempt>,

    /// Number of attempts matching the filter, across all pages
    pub total: usize,

    pub limit: usize,

    pub offset: usize,
}

/// Latest-status counters for one merchant
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub success: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: DeliveryStatus) {
        match status {
            DeliveryStatus::Pending => self.pending += 1,
            DeliveryStatus::Success => self.success += 1,
            DeliveryStatus::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.success + self.failed
    }
}

/// Append-only store of delivery attempts.
///
/// Implementations must accept concurrent appends without losing writes and
/// must refuse to modify an attempt that already succeeded.
#[async_trait]
pub trait AttemptLedger: Send + Sync {
    async fn append(&self, attempt: DeliveryAttempt) -> Result<(), LedgerError>;

    async fn get(&self, id: Uuid) -> Result<Option<DeliveryAttempt>, LedgerError>;

    /// Replace the stored copy of `attempt`.
    async fn update(&self, attempt: &DeliveryAttempt) -> Result<(), LedgerError>;

    /// Merchant's attempts, newest first by creation time.
    async fn list(
        &self,
        merchant_id: Uuid,
        query: &AttemptQuery,
    ) -> Result<AttemptPage, LedgerError>;

    async fn count_by_status(&self, merchant_id: Uuid) -> Result<StatusCounts, LedgerError>;

    /// Failed attempts whose automatic retry is due, oldest first.
    async fn due_for_retry(
        &self,
        now: OffsetDateTime,
        max_attempts: u32,
    ) -> Result<Vec<DeliveryAttempt>, LedgerError>;
}

/// Lookup and configuration of merchants
#[async_trait]
pub trait MerchantStore: Send + Sync {
    async fn insert(&self, merchant: Merchant);

    async fn get(&self, id: Uuid) -> Option<Merchant>;

    /// Find the merchant owning this key/secret pair.
    async fn authenticate(&self, api_key: &str, api_secret: &str) -> Option<Merchant>;

    /// Replace the merchant's webhook endpoint. `None` if the merchant is unknown.
    async fn set_endpoint(&self, id: Uuid, endpoint: WebhookEndpoint) -> Option<Merchant>;
}
