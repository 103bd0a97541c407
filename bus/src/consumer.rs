//! Manual-ack consume loop shared by the worker binaries.

use crate::amqp::{AmqpBus, BusError};
use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::future::Future;

/// Consume `queue`, decoding each delivery as JSON `T` and feeding it to
/// `handler`.
///
/// Acknowledgement discipline:
///
/// - handler `Ok` → ack
/// - handler `Err` → nack without requeue (dead-letter, operator replays)
/// - undecodable payload → nack without requeue (poison message)
///
/// Returns only when the delivery stream ends or an ack/nack fails, so the
/// caller can reconnect and call again.
///
/// # Errors
///
/// Returns [`BusError`] when an acknowledgement cannot be sent.
pub async fn consume_json<T, F, Fut, E>(
    bus: &AmqpBus,
    queue: &str,
    consumer_tag: &str,
    mut handler: F,
) -> Result<(), BusError>
where
    T: DeserializeOwned,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let mut consumer = bus.consume(queue, consumer_tag).await?;

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(err) => {
                tracing::error!(queue, error = %err, "error receiving delivery");
                continue;
            }
        };

        match serde_json::from_slice::<T>(&delivery.data) {
            Ok(envelope) => match handler(envelope).await {
                Ok(()) => delivery.ack(BasicAckOptions::default()).await?,
                Err(err) => {
                    tracing::error!(queue, error = %err, "handler failed, dead-lettering");
                    delivery
                        .nack(BasicNackOptions {
                            requeue: false,
                            ..BasicNackOptions::default()
                        })
                        .await?;
                }
            },
            Err(err) => {
                tracing::warn!(queue, error = %err, "undecodable message, dead-lettering");
                delivery
                    .nack(BasicNackOptions {
                        requeue: false,
                        ..BasicNackOptions::default()
                    })
                    .await?;
            }
        }
    }

    Ok(())
}
