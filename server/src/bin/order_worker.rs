//! Order worker: consumes the order queues and refills inventory when a
//! payment is cancelled.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};
use turnstile_bus::{
    consume_json, AmqpBus, OrderCreated, PaymentCancelled, PaymentSuccess, ORDER_CREATED_QUEUE,
    PAYMENT_CANCELLED_QUEUE, PAYMENT_SUCCESS_QUEUE,
};
use turnstile_inventory::{AvailabilityCache, EtcdInventoryStore, ReservationService};
use turnstile_server::bootstrap::{init_tracing, shutdown_signal};
use turnstile_server::config::Config;
use turnstile_server::refill::{OrderIndex, OrderWorker};

/// How long to wait before reconnecting a failed consumer.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("turnstile_server=info,turnstile_inventory=info,turnstile_bus=info");

    let config = Config::from_env();
    info!(
        etcd = ?config.etcd.endpoints,
        amqp = %config.amqp.url,
        "starting order worker"
    );

    let inventory = Arc::new(
        EtcdInventoryStore::connect(
            &config.etcd.endpoints,
            config.etcd.dial_timeout(),
            config.etcd.op_timeout(),
        )
        .await?,
    );
    let cache = AvailabilityCache::connect(&config.redis.url(), config.reservations.cache_ttl())
        .await?;
    let reservations = Arc::new(ReservationService::new(
        inventory,
        Some(cache),
        config.reservations.policy(),
    ));

    let worker = Arc::new(OrderWorker::new(reservations, Arc::new(OrderIndex::new())));

    // One connection and channel per consumer task.
    {
        let worker = worker.clone();
        let url = config.amqp.url.clone();
        tokio::spawn(consumer_loop(
            url,
            ORDER_CREATED_QUEUE,
            "order-worker-created",
            move |envelope: OrderCreated| {
                let worker = worker.clone();
                async move {
                    worker.handle_order_created(envelope);
                    Ok::<_, std::convert::Infallible>(())
                }
            },
        ));
    }

    {
        let worker = worker.clone();
        let url = config.amqp.url.clone();
        tokio::spawn(consumer_loop(
            url,
            PAYMENT_SUCCESS_QUEUE,
            "order-worker-success",
            move |envelope: PaymentSuccess| {
                let worker = worker.clone();
                async move {
                    worker.handle_payment_success(envelope);
                    Ok::<_, std::convert::Infallible>(())
                }
            },
        ));
    }

    {
        let worker = worker.clone();
        let url = config.amqp.url.clone();
        tokio::spawn(consumer_loop(
            url,
            PAYMENT_CANCELLED_QUEUE,
            "order-worker-cancelled",
            move |envelope: PaymentCancelled| {
                let worker = worker.clone();
                async move { worker.handle_payment_cancelled(envelope).await }
            },
        ));
    }

    shutdown_signal().await;
    info!("order worker stopped");
    Ok(())
}

/// Keep one queue consumed forever, reconnecting on any failure.
async fn consumer_loop<T, H, Fut, E>(amqp_url: String, queue: &'static str, tag: &'static str, handler: H)
where
    T: serde::de::DeserializeOwned,
    H: Fn(T) -> Fut + Clone,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    loop {
        match AmqpBus::connect(&amqp_url).await {
            Ok(bus) => {
                if let Err(err) = bus.declare_queue(queue).await {
                    error!(queue, error = %err, "queue declare failed, retrying");
                } else {
                    match consume_json(&bus, queue, tag, handler.clone()).await {
                        Ok(()) => warn!(queue, "delivery stream ended, reconnecting"),
                        Err(err) => error!(queue, error = %err, "consumer failed, reconnecting"),
                    }
                }
            }
            Err(err) => {
                error!(queue, error = %err, "failed to connect to broker, retrying");
            }
        }
        sleep(RECONNECT_DELAY).await;
    }
}
