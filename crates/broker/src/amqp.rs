//! RabbitMQ backend built on `lapin` (AMQP 0.9.1).
//!
//! Each [`AmqpSession`] owns its own connection and channel. Deliveries are
//! consumed through a `basic.consume` subscription that is confirmed before
//! [`BrokerSession::register_filtered_consumer`] returns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, BasicRejectOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer};
use tokio::time::Instant;

use crate::client::{BrokerConnector, BrokerSession, Disposition, FilteredConsumer, MatchHandler};
use crate::config::BrokerConfig;
use crate::error::BrokerError;

/// AMQP reply code for a normal connection close.
const REPLY_SUCCESS: u16 = 200;

/// Monotonic suffix keeping consumer tags unique within the process.
static CONSUMER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Opens a fresh RabbitMQ connection per session.
pub struct AmqpConnector {
    config: BrokerConfig,
}

impl AmqpConnector {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }
}

#[async_trait]
impl BrokerConnector for AmqpConnector {
    async fn connect(&self) -> Result<Box<dyn BrokerSession>, BrokerError> {
        let url = self.config.redacted_url();

        let connection = Connection::connect(
            &self.config.url,
            ConnectionProperties::default().with_connection_name("hdlbridge-api".into()),
        )
        .await
        .map_err(|e| BrokerError::Unavailable(format!("Connection to {url} failed: {e}")))?;

        let channel = match open_channel(&connection, self.config.prefetch).await {
            Ok(channel) => channel,
            Err(e) => {
                let _ = connection.close(REPLY_SUCCESS, "channel setup failed").await;
                return Err(BrokerError::Unavailable(format!(
                    "Channel setup on {url} failed: {e}"
                )));
            }
        };

        tracing::debug!(broker = %url, "Broker connection opened");

        Ok(Box::new(AmqpSession {
            connection: Some(connection),
            channel,
            queue: None,
            consumer: None,
            requeue_foreign: self.config.requeue_foreign,
        }))
    }
}

async fn open_channel(connection: &Connection, prefetch: u16) -> Result<Channel, lapin::Error> {
    let channel = connection.create_channel().await?;
    channel
        .basic_qos(prefetch, BasicQosOptions::default())
        .await?;
    Ok(channel)
}

/// A single RabbitMQ connection owned by one request.
pub struct AmqpSession {
    /// `None` once closed.
    connection: Option<Connection>,
    channel: Channel,
    queue: Option<String>,
    consumer: Option<(Consumer, FilteredConsumer)>,
    requeue_foreign: bool,
}

#[async_trait]
impl BrokerSession for AmqpSession {
    async fn declare_queue(&mut self, name: &str) -> Result<(), BrokerError> {
        self.channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::QueueDeclare {
                queue: name.to_string(),
                reason: e.to_string(),
            })?;

        self.queue = Some(name.to_string());
        Ok(())
    }

    async fn register_filtered_consumer(
        &mut self,
        job_id: &str,
        on_match: MatchHandler,
    ) -> Result<(), BrokerError> {
        let queue = self
            .queue
            .as_deref()
            .ok_or(BrokerError::Protocol("consumer registered before queue declaration"))?;

        let tag = format!(
            "hdlbridge.{job_id}.{}",
            CONSUMER_SEQ.fetch_add(1, Ordering::Relaxed)
        );

        // Resolves on basic.consume-ok, i.e. once the subscription is live.
        let consumer = self
            .channel
            .basic_consume(
                queue,
                &tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Consume {
                job_id: job_id.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(job_id, queue, consumer_tag = %tag, "Filtered consumer registered");

        self.consumer = Some((
            consumer,
            FilteredConsumer::new(job_id, on_match, self.requeue_foreign),
        ));
        Ok(())
    }

    async fn drain(&mut self, budget: Duration) -> Result<usize, BrokerError> {
        let (consumer, filter) = self
            .consumer
            .as_mut()
            .ok_or(BrokerError::Protocol("drain before consumer registration"))?;

        let deadline = Instant::now() + budget;

        let first = match tokio::time::timeout_at(deadline, consumer.next()).await {
            Err(_) => return Ok(0),
            Ok(None) => {
                return Err(BrokerError::ConnectionLost(
                    "consumer stream ended".to_string(),
                ))
            }
            Ok(Some(delivery)) => delivery?,
        };
        let mut handled = 0;
        let mut next = Some(first);

        // Settle whatever is already buffered without waiting again.
        while let Some(delivery) = next.take() {
            let Some(disposition) = settle_by(deadline, filter, delivery).await? else {
                break;
            };
            handled += 1;
            // A requeued message comes straight back to this consumer.
            if disposition == Disposition::Requeue || Instant::now() >= deadline {
                break;
            }
            next = match consumer.next().now_or_never() {
                Some(Some(delivery)) => Some(delivery?),
                Some(None) | None => None,
            };
        }

        Ok(handled)
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        let Some(connection) = self.connection.take() else {
            return Ok(());
        };
        self.consumer = None;

        connection
            .close(REPLY_SUCCESS, "OK")
            .await
            .map_err(|e| BrokerError::ConnectionLost(format!("Close failed: {e}")))?;

        tracing::debug!("Broker connection closed");
        Ok(())
    }
}

impl Drop for AmqpSession {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        tracing::warn!("Broker session dropped while open, closing in background");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = connection.close(REPLY_SUCCESS, "session dropped").await {
                    tracing::warn!(error = %e, "Background broker close failed");
                }
            });
        }
    }
}

/// Settle a delivery unless `deadline` passes first.
///
/// Returns `None` when the ack/nack did not complete in time; the delivery
/// stays unacknowledged and the broker redelivers it once the channel closes.
async fn settle_by(
    deadline: Instant,
    filter: &FilteredConsumer,
    delivery: Delivery,
) -> Result<Option<Disposition>, BrokerError> {
    match tokio::time::timeout_at(deadline, settle(filter, delivery)).await {
        Ok(disposition) => disposition.map(Some),
        Err(_) => {
            tracing::warn!(job_id = %filter.job_id(), "Settling a delivery overran the drain budget");
            Ok(None)
        }
    }
}

/// Apply the filter's decision to a delivery.
async fn settle(filter: &FilteredConsumer, delivery: Delivery) -> Result<Disposition, BrokerError> {
    let disposition = filter.dispose(&delivery.data);
    match disposition {
        Disposition::Ack => delivery.ack(BasicAckOptions::default()).await?,
        Disposition::Requeue => {
            delivery
                .nack(BasicNackOptions {
                    requeue: true,
                    ..Default::default()
                })
                .await?
        }
        Disposition::Reject => {
            delivery
                .reject(BasicRejectOptions { requeue: false })
                .await?
        }
    }
    Ok(disposition)
}
