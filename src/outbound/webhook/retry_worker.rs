use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::domain::ports::AttemptLedger;
use crate::outbound::webhook::retry_controller::RetryController;

/// Background task that retries failed attempts once their backoff elapses.
///
/// Every retry goes through the [`RetryController`], so manual and automatic
/// retries share the same attempt cap and in-flight exclusion.
pub struct RetryWorker {
    ledger: Arc<dyn AttemptLedger>,
    controller: Arc<RetryController>,
    max_attempts: u32,
    poll_interval: Duration,
}

impl RetryWorker {
    pub fn new(
        ledger: Arc<dyn AttemptLedger>,
        controller: Arc<RetryController>,
        max_attempts: u32,
        poll_interval: Duration,
    ) -> Self {
        Self {
            ledger,
            controller,
            max_attempts,
            poll_interval,
        }
    }

    /// Start the polling loop.
    ///
    /// The loop stops once `shutdown` carries `true` or its sender is dropped.
    pub fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        info!(poll_interval = ?self.poll_interval, "Webhook retry worker starting");

        tokio::spawn(async move {
            // A zero period would make `interval` panic
            let period = self.poll_interval.max(Duration::from_millis(1));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Webhook retry worker stopped");
        })
    }

    /// Retry every attempt that is due now; returns how many were retried
    pub async fn run_once(&self) -> usize {
        let due = match self
            .ledger
            .due_for_retry(OffsetDateTime::now_utc(), self.max_attempts)
            .await
        {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "Failed to load attempts due for retry");
                return 0;
            }
        };

        if due.is_empty() {
            return 0;
        }
        debug!(count = due.len(), "Attempts due for automatic retry");

        let handles = due.into_iter().map(|attempt| {
            let controller = self.controller.clone();
            tokio::spawn(async move { (attempt.id, controller.retry(attempt.id).await) })
        });

        let mut retried = 0;
        for joined in join_all(handles).await {
            match joined {
                Ok((_, Ok(_))) => retried += 1,
                Ok((attempt_id, Err(e))) => {
                    warn!(attempt_id = %attempt_id, error = %e, "Automatic retry skipped");
                }
                Err(e) => error!(error = %e, "Automatic retry task panicked"),
            }
        }
        retried
    }
}
