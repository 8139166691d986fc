//! Per-request job orchestration.
//!
//! [`JobDispatcher::process_job`] resolves the uploaded file for a job id,
//! arms a correlation entry, subscribes a filtered consumer on a fresh
//! broker session, triggers the build, and then waits a bounded time for
//! the completion notification. The session is closed and the entry
//! released on every exit path, in that order.
//!
//! The consumer is live before the build service is called, so a
//! notification published the instant the build finishes cannot slip past.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hdlbridge_broker::client::hand_off_to;
use hdlbridge_broker::config::DEFAULT_QUEUE;
use hdlbridge_broker::registry::RegistryError;
use hdlbridge_broker::wait::DEFAULT_POLL_SLICE;
use hdlbridge_broker::{
    BrokerConnector, BrokerError, BrokerSession, CorrelationRegistry, NotificationMessage,
    WaitCoordinator, WaitOutcome,
};
use hdlbridge_core::types::Timestamp;
use tokio_util::sync::CancellationToken;

use super::artifacts::ArtifactLocator;
use super::build_service::{BuildService, BuildServiceError};

/// Default time to wait for a completion notification.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Status recorded once the build service has accepted the job.
const STATUS_PROCESSING: &str = "processing";
/// Status recorded when no notification arrived in time.
const STATUS_TIMED_OUT: &str = "timed_out";

/// One build submission. Built right before the trigger call and read-only
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub job_id: String,
    pub source_url: String,
    pub submitted_at: Timestamp,
}

impl JobRequest {
    pub fn new(job_id: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            source_url: source_url.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// A completed job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub job_id: String,
    /// Where the build service fetched the source from.
    pub file_url: String,
    pub notification: NotificationMessage,
    /// The build service's response to the trigger call.
    pub processing_result: serde_json::Value,
}

/// A build that was triggered without waiting for completion.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub job_id: String,
    pub file_url: String,
    pub processing_result: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No uploaded file named '{0}'")]
    NotFound(String),

    #[error("A job for '{0}' is already waiting for its result")]
    Conflict(String),

    #[error(transparent)]
    BrokerUnavailable(#[from] BrokerError),

    #[error(transparent)]
    Upstream(#[from] BuildServiceError),

    #[error("No completion notification for '{job_id}' within {waited:?}")]
    Timeout { job_id: String, waited: Duration },

    #[error("Wait for '{0}' was cancelled")]
    Cancelled(String),

    #[error("Document store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Tunables for [`JobDispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Durable queue carrying completion notifications.
    pub queue: String,
    /// Total wait budget per job.
    pub wait_timeout: Duration,
    /// Upper bound on each broker drain.
    pub poll_slice: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            queue: DEFAULT_QUEUE.to_string(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            poll_slice: DEFAULT_POLL_SLICE,
        }
    }
}

/// Orchestrates trigger-and-wait for build jobs.
///
/// Shared by all requests; the [`CorrelationRegistry`] it owns is the only
/// cross-request state.
pub struct JobDispatcher {
    connector: Arc<dyn BrokerConnector>,
    locator: Arc<dyn ArtifactLocator>,
    build_service: Arc<dyn BuildService>,
    registry: Arc<CorrelationRegistry>,
    coordinator: WaitCoordinator,
    queue: String,
    wait_timeout: Duration,
}

impl JobDispatcher {
    /// * `cancel` - cancelling it ends every in-progress wait with
    ///   [`DispatchError::Cancelled`]. Fired on server shutdown.
    pub fn new(
        connector: Arc<dyn BrokerConnector>,
        locator: Arc<dyn ArtifactLocator>,
        build_service: Arc<dyn BuildService>,
        settings: DispatchSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            connector,
            locator,
            build_service,
            registry: Arc::new(CorrelationRegistry::new()),
            coordinator: WaitCoordinator::new(settings.poll_slice, cancel),
            queue: settings.queue,
            wait_timeout: settings.wait_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Trigger the build for `job_id` and wait for its completion notification.
    pub async fn process_job(&self, job_id: &str) -> Result<JobOutcome, DispatchError> {
        let source_url = self.resolve(job_id).await?;

        let mut guard = self.registry.arm(job_id).map_err(|e| match e {
            RegistryError::AlreadyPending(id) => DispatchError::Conflict(id),
        })?;

        let mut session = self.connector.connect().await?;
        tracing::debug!(job_id, "Broker session opened");

        let result = self
            .trigger_and_wait(session.as_mut(), job_id, source_url)
            .await;

        if let Err(e) = session.close().await {
            tracing::warn!(job_id, error = %e, "Failed to close broker session");
        }
        guard.release();

        match &result {
            Ok(outcome) => tracing::info!(
                job_id,
                status = %outcome.notification.status,
                "Job completed",
            ),
            Err(e) => tracing::warn!(job_id, error = %e, "Job did not complete"),
        }
        result
    }

    /// Trigger the build for `job_id` without waiting for completion.
    pub async fn submit_job(&self, job_id: &str) -> Result<SubmitOutcome, DispatchError> {
        let source_url = self.resolve(job_id).await?;
        let request = JobRequest::new(job_id, source_url);

        let processing_result = self.build_service.trigger(&request).await?;
        self.record_status(job_id, STATUS_PROCESSING).await;
        tracing::info!(job_id, "Job submitted without waiting");

        Ok(SubmitOutcome {
            job_id: request.job_id,
            file_url: request.source_url,
            processing_result,
        })
    }

    async fn resolve(&self, job_id: &str) -> Result<String, DispatchError> {
        self.locator
            .find_source_url(job_id)
            .await?
            .ok_or_else(|| DispatchError::NotFound(job_id.to_string()))
    }

    async fn trigger_and_wait(
        &self,
        session: &mut dyn BrokerSession,
        job_id: &str,
        source_url: String,
    ) -> Result<JobOutcome, DispatchError> {
        session.declare_queue(&self.queue).await?;
        session
            .register_filtered_consumer(job_id, hand_off_to(Arc::clone(&self.registry)))
            .await?;

        let request = JobRequest::new(job_id, source_url);
        let processing_result = self.build_service.trigger(&request).await?;
        tracing::info!(
            job_id,
            source_url = %request.source_url,
            "Build triggered, waiting for notification",
        );
        self.record_status(job_id, STATUS_PROCESSING).await;

        let outcome = self
            .coordinator
            .await_result(session, &self.registry, job_id, self.wait_timeout)
            .await?;

        match outcome {
            WaitOutcome::Fulfilled(notification) => {
                self.record_status(job_id, &notification.status).await;
                Ok(JobOutcome {
                    job_id: request.job_id,
                    file_url: request.source_url,
                    notification,
                    processing_result,
                })
            }
            WaitOutcome::TimedOut => {
                self.record_status(job_id, STATUS_TIMED_OUT).await;
                Err(DispatchError::Timeout {
                    job_id: job_id.to_string(),
                    waited: self.wait_timeout,
                })
            }
            WaitOutcome::Cancelled => Err(DispatchError::Cancelled(job_id.to_string())),
        }
    }

    /// Best-effort status write; failures never change the job outcome.
    async fn record_status(&self, job_id: &str, status: &str) {
        if let Err(e) = self.locator.update_status(job_id, status).await {
            tracing::warn!(job_id, status, error = %e, "Failed to record job status");
        }
    }
}
