//! Message-queue bridge for asynchronous build completions.
//!
//! A request that triggers an external build job arms a slot in the
//! [`registry::CorrelationRegistry`], opens a [`client::BrokerSession`]
//! with a consumer filtered to its job id, and then lets the
//! [`wait::WaitCoordinator`] alternate between draining the session and
//! peeking the registry until the completion notification lands or the
//! deadline passes.
//!
//! Two broker backends implement [`client::BrokerConnector`]:
//! [`amqp::AmqpConnector`] for RabbitMQ and [`memory::MemoryBroker`], an
//! in-process queue used by tests and local development.

pub mod amqp;
pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod messages;
pub mod registry;
pub mod wait;

pub use client::{BrokerConnector, BrokerSession, HandOff};
pub use error::BrokerError;
pub use messages::NotificationMessage;
pub use registry::{CorrelationGuard, CorrelationRegistry, EntryState, FulfillOutcome};
pub use wait::{WaitCoordinator, WaitOutcome};
