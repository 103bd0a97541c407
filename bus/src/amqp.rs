//! lapin-backed AMQP connection, publish and consume.

use crate::publisher::Publish;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use std::future::Future;
use std::pin::Pin;

/// Failure talking to the broker.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The underlying AMQP operation failed.
    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),
    /// The broker could not be reached.
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// One AMQP connection plus the channel all operations run on.
///
/// Queues are declared durable and non-autodelete; consumers created here
/// run with manual acknowledgement.
pub struct AmqpBus {
    // Held so the connection outlives the channel.
    _connection: Connection,
    channel: Channel,
}

impl AmqpBus {
    /// Connect to the broker at `amqp_url` and open a channel.
    ///
    /// # Errors
    ///
    /// Returns the broker error if dialing or channel setup fails.
    pub async fn connect(amqp_url: &str) -> Result<Self, BusError> {
        let connection = Connection::connect(amqp_url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        tracing::info!(url = %amqp_url, "connected to AMQP broker");
        Ok(Self {
            _connection: connection,
            channel,
        })
    }

    /// Declare `queue` durable and non-autodelete. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the broker error if the declare is refused.
    pub async fn declare_queue(&self, queue: &str) -> Result<(), BusError> {
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }

    /// Declare every queue in `queues`.
    ///
    /// # Errors
    ///
    /// Returns the first declare failure.
    pub async fn declare_queues(&self, queues: &[&str]) -> Result<(), BusError> {
        for queue in queues {
            self.declare_queue(queue).await?;
        }
        Ok(())
    }

    /// Start a manual-ack consumer on `queue`.
    ///
    /// The returned [`Consumer`] is a stream of deliveries; the caller acks
    /// each one, or nacks without requeue to dead-letter poison messages.
    ///
    /// # Errors
    ///
    /// Returns the broker error if the consume cannot start.
    pub async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<Consumer, BusError> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        tracing::info!(queue, consumer_tag, "consuming");
        Ok(consumer)
    }
}

impl Publish for AmqpBus {
    fn publish<'a>(
        &'a self,
        queue: &'a str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + 'a>> {
        Box::pin(async move {
            self.channel
                .basic_publish(
                    "",
                    queue,
                    BasicPublishOptions::default(),
                    &payload,
                    BasicProperties::default().with_content_type("application/json".into()),
                )
                .await?
                .await?;
            tracing::debug!(queue, bytes = payload.len(), "published message");
            Ok(())
        })
    }
}
