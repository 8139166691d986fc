//! Broker client abstraction.
//!
//! A [`BrokerConnector`] opens one [`BrokerSession`] per triggering
//! request. The session owns the underlying connection exclusively; it is
//! never shared between requests.
//!
//! Delivery handling is backend-independent and lives in
//! [`FilteredConsumer::dispose`], which decides for every raw payload
//! whether the backend should ack, requeue or reject it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrokerError;
use crate::messages::{parse_notification, NotificationMessage};
use crate::registry::{CorrelationRegistry, FulfillOutcome};

/// Opens broker sessions.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Open a new connection. Fails with [`BrokerError::Unavailable`] on
    /// network or handshake failure.
    async fn connect(&self) -> Result<Box<dyn BrokerSession>, BrokerError>;
}

/// One broker connection owned by a single request.
#[async_trait]
pub trait BrokerSession: Send {
    /// Declare (or attach to) a durable queue. Safe to repeat.
    async fn declare_queue(&mut self, name: &str) -> Result<(), BrokerError>;

    /// Subscribe to the declared queue with a consumer filtered on `job_id`.
    ///
    /// Returns only once the broker has confirmed the subscription, so a
    /// notification published after this call cannot be missed.
    async fn register_filtered_consumer(
        &mut self,
        job_id: &str,
        on_match: MatchHandler,
    ) -> Result<(), BrokerError>;

    /// Wait at most `budget` for deliveries and dispose of them.
    ///
    /// Returns the number of deliveries handled.
    async fn drain(&mut self, budget: Duration) -> Result<usize, BrokerError>;

    /// Close the connection. Calls after the first are no-ops.
    async fn close(&mut self) -> Result<(), BrokerError>;
}

/// Outcome of handing a matching notification to its waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandOff {
    /// The waiter took (or had already taken) the notification.
    Accepted,
    /// Nobody is waiting for it any more.
    Refused,
}

/// Callback invoked for notifications whose `file` equals the consumer's id.
pub type MatchHandler = Box<dyn Fn(NotificationMessage) -> HandOff + Send + Sync>;

/// Build a [`MatchHandler`] that fulfils entries in `registry`.
///
/// Duplicates are accepted so they are acked and do not loop back onto
/// the queue; a missing entry is refused so the message stays available.
pub fn hand_off_to(registry: Arc<CorrelationRegistry>) -> MatchHandler {
    Box::new(move |message: NotificationMessage| {
        let job_id = message.file.clone();
        match registry.fulfill(&job_id, message) {
            FulfillOutcome::Fulfilled => {
                tracing::info!(job_id = %job_id, "Notification handed off");
                HandOff::Accepted
            }
            FulfillOutcome::Duplicate => {
                tracing::debug!(job_id = %job_id, "Duplicate notification ignored");
                HandOff::Accepted
            }
            FulfillOutcome::NotArmed => HandOff::Refused,
        }
    })
}

/// What the backend should do with a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge and drop.
    Ack,
    /// Negative-acknowledge and put it back on the queue.
    Requeue,
    /// Negative-acknowledge without requeue (dead-letters if configured).
    Reject,
}

/// A consumer that only hands off notifications for one job id.
pub struct FilteredConsumer {
    job_id: String,
    on_match: MatchHandler,
    requeue_foreign: bool,
}

impl FilteredConsumer {
    /// * `requeue_foreign` - requeue notifications for other ids instead of
    ///   acknowledging them.
    pub fn new(job_id: impl Into<String>, on_match: MatchHandler, requeue_foreign: bool) -> Self {
        Self {
            job_id: job_id.into(),
            on_match,
            requeue_foreign,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Decode `payload` and decide its fate.
    pub fn dispose(&self, payload: &[u8]) -> Disposition {
        let message = match parse_notification(payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    job_id = %self.job_id,
                    error = %e,
                    raw_message = %String::from_utf8_lossy(payload),
                    "Rejecting malformed notification",
                );
                return Disposition::Reject;
            }
        };

        if message.file != self.job_id {
            tracing::trace!(
                job_id = %self.job_id,
                file = %message.file,
                "Ignoring notification for another job",
            );
            return if self.requeue_foreign {
                Disposition::Requeue
            } else {
                Disposition::Ack
            };
        }

        match (self.on_match)(message) {
            HandOff::Accepted => Disposition::Ack,
            HandOff::Refused => Disposition::Requeue,
        }
    }
}
