//! Bounded wait for a correlated completion notification.
//!
//! [`WaitCoordinator::await_result`] alternates short, budgeted
//! [`BrokerSession::drain`] calls with non-blocking registry peeks until the
//! entry is fulfilled, the overall deadline passes, or the cancellation
//! token fires. Every `.await` inside the loop is time-bounded, so the
//! coordinator never holds its task past `total_timeout + poll_slice`.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::BrokerSession;
use crate::error::BrokerError;
use crate::messages::NotificationMessage;
use crate::registry::{CorrelationRegistry, EntryState};

/// Default per-iteration drain budget.
pub const DEFAULT_POLL_SLICE: Duration = Duration::from_secs(1);

/// How a wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The matching notification arrived.
    Fulfilled(NotificationMessage),
    /// The deadline passed in silence. The entry is left `Expired`.
    TimedOut,
    /// The cancellation token fired first.
    Cancelled,
}

/// Polls a broker session and the registry in fixed slices.
#[derive(Debug, Clone)]
pub struct WaitCoordinator {
    poll_slice: Duration,
    cancel: CancellationToken,
}

impl Default for WaitCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_SLICE, CancellationToken::new())
    }
}

impl WaitCoordinator {
    /// * `poll_slice` - upper bound on each drain call (clamped to >= 1ms).
    /// * `cancel`     - ends every in-progress wait when cancelled.
    pub fn new(poll_slice: Duration, cancel: CancellationToken) -> Self {
        Self {
            poll_slice: poll_slice.max(Duration::from_millis(1)),
            cancel,
        }
    }

    pub fn poll_slice(&self) -> Duration {
        self.poll_slice
    }

    /// Wait up to `total_timeout` for `job_id` to be fulfilled.
    ///
    /// Broker errors end the wait immediately unless the entry was already
    /// fulfilled; retrying is the caller's call.
    pub async fn await_result(
        &self,
        session: &mut dyn BrokerSession,
        registry: &CorrelationRegistry,
        job_id: &str,
        total_timeout: Duration,
    ) -> Result<WaitOutcome, BrokerError> {
        let started = Instant::now();
        let mut slices: u32 = 0;

        loop {
            if let Some(EntryState::Fulfilled(message)) = registry.peek(job_id) {
                tracing::debug!(job_id, slices, "Wait fulfilled");
                return Ok(WaitOutcome::Fulfilled(message));
            }

            let remaining = total_timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                registry.expire(job_id);
                tracing::info!(
                    job_id,
                    slices,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Wait timed out",
                );
                return Ok(WaitOutcome::TimedOut);
            }

            let budget = remaining.min(self.poll_slice);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!(job_id, slices, "Wait cancelled");
                    return Ok(WaitOutcome::Cancelled);
                }
                drained = session.drain(budget) => {
                    if let Err(e) = drained {
                        // The hand-off may have landed before the failure.
                        if let Some(EntryState::Fulfilled(message)) = registry.peek(job_id) {
                            tracing::warn!(job_id, error = %e, "Broker failed after fulfilment");
                            return Ok(WaitOutcome::Fulfilled(message));
                        }
                        return Err(e);
                    }
                }
            }
            slices += 1;
        }
    }
}
