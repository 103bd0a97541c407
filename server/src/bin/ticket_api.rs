//! Ticket API: reservation + checkout, availability read, payment webhooks.

use std::sync::Arc;
use tracing::info;
use turnstile_bus::{
    AmqpBus, BufferedPublisher, ORDER_CREATED_QUEUE, PAYMENT_CANCELLED_QUEUE,
    PAYMENT_SUCCESS_QUEUE,
};
use turnstile_core::retry::RetryPolicy;
use turnstile_inventory::{AvailabilityCache, EtcdInventoryStore, ReservationService};
use turnstile_server::api::TicketApiState;
use turnstile_server::bootstrap::{init_tracing, serve};
use turnstile_server::checkout::HttpCheckoutClient;
use turnstile_server::config::Config;
use turnstile_server::routes::ticket_api_router;

/// Orders buffered while the broker is unreachable.
const PUBLISH_BUFFER: usize = 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("turnstile_server=info,turnstile_inventory=info,turnstile_bus=info,tower_http=warn");

    let config = Config::from_env();
    info!(
        redis = %config.redis.addr,
        etcd = ?config.etcd.endpoints,
        amqp = %config.amqp.url,
        port = config.server.port,
        "starting ticket API"
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

    let bus = Arc::new(AmqpBus::connect(&config.amqp.url).await?);
    bus.declare_queues(&[
        ORDER_CREATED_QUEUE,
        PAYMENT_SUCCESS_QUEUE,
        PAYMENT_CANCELLED_QUEUE,
    ])
    .await?;
    let publisher = BufferedPublisher::new(bus, PUBLISH_BUFFER, RetryPolicy::default());

    let checkout = Arc::new(HttpCheckoutClient::new(
        config.checkout.payment_processor_url.clone(),
        config.checkout.callback_base_url.clone(),
    ));

    let state = TicketApiState {
        reservations,
        publisher,
        checkout,
        jwt_secret: Arc::new(config.auth.jwt_secret.clone()),
        frontend_url: config.checkout.frontend_url.clone(),
    };

    serve(
        ticket_api_router(state, &config.server.cors_allowed_origin),
        config.server.port,
    )
    .await?;
    Ok(())
}
