use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::models::{DeliveryAttempt, DeliveryStatus};
use crate::domain::ports::{AttemptLedger, AttemptPage, AttemptQuery, LedgerError, StatusCounts};

/// In-memory attempt ledger
#[derive(Debug, Default)]
pub struct InMemoryAttemptLedger {
    inner: RwLock<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    /// Ids in insertion order
    order: Vec<Uuid>,

    records: HashMap<Uuid, DeliveryAttempt>,
}

impl InMemoryAttemptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.order.is_empty()
    }
}

#[async_trait]
impl AttemptLedger for InMemoryAttemptLedger {
    async fn append(&self, attempt: DeliveryAttempt) -> Result<(), LedgerError> {
        let mut state = self.inner.write().await;
        if state.records.contains_key(&attempt.id) {
            return Err(LedgerError::DuplicateId(attempt.id));
        }

        debug!(
            attempt_id = %attempt.id,
            merchant_id = %attempt.merchant_id,
            event = %attempt.event,
            "Recording delivery attempt"
        );
        state.order.push(attempt.id);
        state.records.insert(attempt.id, attempt);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DeliveryAttempt>, LedgerError> {
        let state = self.inner.read().await;
        Ok(state.records.get(&id).cloned())
    }

    async fn update(&self, attempt: &DeliveryAttempt) -> Result<(), LedgerError> {
        let mut state = self.inner.write().await;
        let stored = state
            .records
            .get_mut(&attempt.id)
            .ok_or(LedgerError::NotFound(attempt.id))?;

        if stored.is_succeeded() {
            return Err(LedgerError::Immutable(attempt.id));
        }

        *stored = attempt.clone();
        Ok(())
    }

    async fn list(
        &self,
        merchant_id: Uuid,
        query: &AttemptQuery,
    ) -> Result<AttemptPage, LedgerError> {
        let state = self.inner.read().await;

        // Reverse insertion order first so the stable sort keeps the newest
        // insert ahead when creation times tie.
        let mut matching: Vec<&DeliveryAttempt> = state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.records.get(id))
            .filter(|a| a.merchant_id == merchant_id)
            .filter(|a| query.status.is_none_or(|s| a.status == s))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let limit = query.effective_limit();
        let offset = query.effective_offset();
        let total = matching.len();
        let data = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        Ok(AttemptPage {
            data,
            total,
            limit,
            offset,
        })
    }

    async fn count_by_status(&self, merchant_id: Uuid) -> Result<StatusCounts, LedgerError> {
        let state = self.inner.read().await;
        let mut counts = StatusCounts::default();

        for attempt in state.records.values() {
            if attempt.merchant_id == merchant_id {
                counts.record(attempt.status);
            }
        }

        Ok(counts)
    }

    async fn due_for_retry(
        &self,
        now: OffsetDateTime,
        max_attempts: u32,
    ) -> Result<Vec<DeliveryAttempt>, LedgerError> {
        let state = self.inner.read().await;
        let mut due: Vec<DeliveryAttempt> = state
            .order
            .iter()
            .filter_map(|id| state.records.get(id))
            .filter(|a| a.status == DeliveryStatus::Failed && a.attempts < max_attempts)
            .filter(|a| a.next_retry_at.is_some_and(|at| at <= now))
            .cloned()
            .collect();
        due.sort_by_key(|a| a.next_retry_at);
        Ok(due)
    }
}
