//! In-process broker backend.
//!
//! [`MemoryBroker`] keeps named queues in memory and hands out
//! [`MemorySession`]s that follow the same consumer and disposition rules
//! as the AMQP backend. It also counts opened and closed connections and
//! exposes the live consumer set, which lets tests assert the
//! connection-lifecycle and consume-before-trigger guarantees directly.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::client::{BrokerConnector, BrokerSession, Disposition, FilteredConsumer, MatchHandler};
use crate::error::BrokerError;
use crate::messages::NotificationMessage;

#[derive(Default)]
struct QueueState {
    queues: HashMap<String, VecDeque<Vec<u8>>>,
    /// `(session id, job id)` of every registered, still-open consumer.
    consumers: Vec<(u64, String)>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<QueueState>,
    published: Notify,
    next_session: AtomicU64,
    opened: AtomicUsize,
    closed: AtomicUsize,
    unavailable: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// An in-memory message broker.
///
/// Cloning yields another handle to the same queues.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
    requeue_foreign: bool,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requeue notifications for other job ids instead of acknowledging them.
    pub fn with_requeue_foreign(mut self, requeue_foreign: bool) -> Self {
        self.requeue_foreign = requeue_foreign;
        self
    }

    /// Make subsequent `connect` calls fail as if the broker were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Append a raw payload to `queue`, creating the queue if needed.
    pub fn publish(&self, queue: &str, payload: impl Into<Vec<u8>>) {
        self.shared
            .lock()
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(payload.into());
        self.shared.published.notify_waiters();
    }

    /// Serialize and publish a notification.
    pub fn publish_notification(&self, queue: &str, message: &NotificationMessage) {
        match serde_json::to_vec(message) {
            Ok(payload) => self.publish(queue, payload),
            Err(e) => tracing::error!(error = %e, "Failed to encode notification"),
        }
    }

    /// Messages currently waiting on `queue`.
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.shared.lock().queues.get(queue).map_or(0, VecDeque::len)
    }

    /// Job ids of consumers registered on sessions that are still open.
    pub fn active_consumers(&self) -> Vec<String> {
        self.shared
            .lock()
            .consumers
            .iter()
            .map(|(_, job_id)| job_id.clone())
            .collect()
    }

    pub fn connections_opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    pub fn connections_closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Sessions opened and not yet closed.
    pub fn open_connections(&self) -> usize {
        self.connections_opened() - self.connections_closed()
    }
}

#[async_trait]
impl BrokerConnector for MemoryBroker {
    async fn connect(&self) -> Result<Box<dyn BrokerSession>, BrokerError> {
        if self.shared.unavailable.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable(
                "in-memory broker marked unavailable".to_string(),
            ));
        }

        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            shared: Arc::clone(&self.shared),
            id: self.shared.next_session.fetch_add(1, Ordering::SeqCst),
            open: true,
            queue: None,
            consumer: None,
            requeue_foreign: self.requeue_foreign,
        }))
    }
}

/// Session on a [`MemoryBroker`].
pub struct MemorySession {
    shared: Arc<Shared>,
    id: u64,
    open: bool,
    queue: Option<String>,
    consumer: Option<FilteredConsumer>,
    requeue_foreign: bool,
}

impl MemorySession {
    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.open {
            Ok(())
        } else {
            Err(BrokerError::ConnectionLost("session is closed".to_string()))
        }
    }

    /// Dispose of every message queued right now.
    ///
    /// Returns how many were consumed (acked or rejected); requeued
    /// messages go back to the head of the queue and are not counted.
    fn settle_available(&self) -> usize {
        let (Some(queue), Some(filter)) = (self.queue.as_deref(), self.consumer.as_ref()) else {
            return 0;
        };

        // Dispose outside the lock: the match handler takes the registry lock.
        let batch: Vec<Vec<u8>> = self
            .shared
            .lock()
            .queues
            .get_mut(queue)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default();

        let mut consumed = 0;
        let mut requeued = Vec::new();
        for payload in batch {
            match filter.dispose(&payload) {
                Disposition::Ack | Disposition::Reject => consumed += 1,
                Disposition::Requeue => requeued.push(payload),
            }
        }

        if !requeued.is_empty() {
            let mut state = self.shared.lock();
            let q = state.queues.entry(queue.to_string()).or_default();
            for payload in requeued.into_iter().rev() {
                q.push_front(payload);
            }
        }

        consumed
    }

    fn mark_closed(&mut self) {
        if self.open {
            self.open = false;
            self.consumer = None;
            self.shared.lock().consumers.retain(|(id, _)| *id != self.id);
            self.shared.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl BrokerSession for MemorySession {
    async fn declare_queue(&mut self, name: &str) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.shared
            .lock()
            .queues
            .entry(name.to_string())
            .or_default();
        self.queue = Some(name.to_string());
        Ok(())
    }

    async fn register_filtered_consumer(
        &mut self,
        job_id: &str,
        on_match: MatchHandler,
    ) -> Result<(), BrokerError> {
        self.ensure_open()?;
        if self.queue.is_none() {
            return Err(BrokerError::Protocol(
                "consumer registered before queue declaration",
            ));
        }

        {
            let mut state = self.shared.lock();
            state.consumers.retain(|(id, _)| *id != self.id);
            state.consumers.push((self.id, job_id.to_string()));
        }
        self.consumer = Some(FilteredConsumer::new(
            job_id,
            on_match,
            self.requeue_foreign,
        ));
        Ok(())
    }

    async fn drain(&mut self, budget: Duration) -> Result<usize, BrokerError> {
        self.ensure_open()?;
        if self.consumer.is_none() {
            return Err(BrokerError::Protocol("drain before consumer registration"));
        }

        let deadline = Instant::now() + budget;

        // Arm the wakeup before looking at the queue so a publish landing
        // in between is not missed.
        let notified = self.shared.published.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let consumed = self.settle_available();
        if consumed > 0 {
            return Ok(consumed);
        }

        if tokio::time::timeout_at(deadline, notified).await.is_err() {
            return Ok(0);
        }
        Ok(self.settle_available())
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        self.mark_closed();
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.mark_closed();
    }
}
