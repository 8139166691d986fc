/// Errors raised by broker sessions.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Connecting or completing the AMQP handshake failed.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// A queue declaration was refused.
    #[error("Failed to declare queue '{queue}': {reason}")]
    QueueDeclare { queue: String, reason: String },

    /// The broker refused or failed to confirm the consumer.
    #[error("Failed to register consumer for '{job_id}': {reason}")]
    Consume { job_id: String, reason: String },

    /// An operation was attempted before the required setup step.
    #[error("Broker session misuse: {0}")]
    Protocol(&'static str),

    /// The established connection failed mid-session.
    #[error("Broker connection lost: {0}")]
    ConnectionLost(String),
}

impl From<lapin::Error> for BrokerError {
    fn from(e: lapin::Error) -> Self {
        Self::ConnectionLost(e.to_string())
    }
}
