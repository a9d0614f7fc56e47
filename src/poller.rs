//! Long-polling update loop with an offset cursor.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::metrics;
use crate::telegram::{BotApi, Update};
use crate::Result;

/// Exponential retry delay for failed polls.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(120))
    }
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
        }
    }

    /// Delay before the next attempt; doubles with every consecutive failure.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.failures.min(16));
        self.failures = self.failures.saturating_add(1);
        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

/// getUpdates consumer that tracks the acknowledgment cursor.
pub struct UpdatePoller {
    api: BotApi,
    timeout_secs: u64,
    offset: Option<i64>,
    backoff: Backoff,
}

impl UpdatePoller {
    pub fn new(api: BotApi, timeout_secs: u64) -> Self {
        Self {
            api,
            timeout_secs,
            offset: None,
            backoff: Backoff::default(),
        }
    }

    /// Next cursor value (last seen update id + 1), if anything was seen.
    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    /// Fetch the next batch and advance the cursor past it.
    pub async fn next_batch(&mut self) -> Result<Vec<Update>> {
        let updates = self.api.get_updates(self.offset, self.timeout_secs).await?;

        if let Some(max_id) = updates.iter().map(|u| u.update_id).max() {
            let next = max_id + 1;
            self.offset = Some(self.offset.map_or(next, |current| current.max(next)));
            debug!(count = updates.len(), offset = next, "Received updates");
        }

        Ok(updates)
    }

    /// Poll forever, handing every update to `handler`.
    ///
    /// Failed polls are logged and retried after the backoff delay; they
    /// never end the loop.
    pub async fn run<F, Fut>(&mut self, mut handler: F)
    where
        F: FnMut(Update) -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            match self.next_batch().await {
                Ok(updates) => {
                    self.backoff.reset();
                    for update in updates {
                        handler(update).await;
                    }
                }
                Err(e) => {
                    metrics::record_poll_error();
                    let delay = self.backoff.next_delay();
                    if e.is_transient() {
                        warn!(
                            error = %e,
                            failures = self.backoff.failures(),
                            retry_in_secs = delay.as_secs(),
                            "Polling failed"
                        );
                    } else {
                        // 401 / 409: needs an operator, not a retry.
                        error!(
                            error = %e,
                            failures = self.backoff.failures(),
                            retry_in_secs = delay.as_secs(),
                            "Polling rejected"
                        );
                    }
                    sleep(delay).await;
                }
            }
        }
    }
}
