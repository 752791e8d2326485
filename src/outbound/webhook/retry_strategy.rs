use std::time::Duration;

/// Retry strategy for webhook delivery.
///
/// `intervals[n - 1]` is the wait after the n-th failed try. Past the end of
/// the list the last interval repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryStrategy {
    max_attempts: u32,

    intervals: Vec<Duration>,
}

impl RetryStrategy {
    pub fn new(max_attempts: u32, intervals: Vec<Duration>) -> Self {
        Self {
            max_attempts,
            intervals,
        }
    }

    /// 1 minute, 5 minutes, 30 minutes, 2 hours
    pub fn production() -> Self {
        Self::new(
            5,
            [60, 300, 1800, 7200]
                .into_iter()
                .map(Duration::from_secs)
                .collect(),
        )
    }

    /// Short intervals for local testing
    pub fn test_mode() -> Self {
        Self::new(
            5,
            [5, 10, 15, 20].into_iter().map(Duration::from_secs).collect(),
        )
    }

    /// Set maximum number of tries
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Get maximum number of tries
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another try is allowed after `attempts` tries
    pub fn can_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Delay before the automatic retry following the `attempts`-th failure
    pub fn next_delay(&self, attempts: u32) -> Option<Duration> {
        if attempts == 0 || !self.can_retry(attempts) {
            return None;
        }

        let index = (attempts as usize - 1).min(self.intervals.len().checked_sub(1)?);
        self.intervals.get(index).copied()
    }

    /// Check if an HTTP status code should trigger an automatic retry
    pub fn should_retry_status(&self, status_code: u16) -> bool {
        match status_code {
            // Success - don't retry
            200..=299 => false,

            // Client errors - don't retry
            408 | 429 => true,
            400..=499 => false,

            // Server errors - retry
            500..=599 => true,

            // Other codes - don't retry
            _ => false,
        }
    }

    /// Every automatic retry delay, in order
    pub fn delays(&self) -> Vec<Duration> {
        (1..self.max_attempts)
            .filter_map(|attempts| self.next_delay(attempts))
            .collect()
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::production()
    }
}
