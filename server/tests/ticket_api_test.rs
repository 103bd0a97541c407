//! Ticket API integration tests over in-memory stores.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use turnstile_bus::{
    BufferedPublisher, MemoryBus, OrderCreated, PaymentCancelled, PaymentSuccess,
    ORDER_CREATED_QUEUE, PAYMENT_CANCELLED_QUEUE, PAYMENT_SUCCESS_QUEUE,
};
use turnstile_core::retry::RetryPolicy;
use turnstile_core::{token, EventId, UserId};
use turnstile_inventory::{InventoryStore, MemoryInventoryStore, ReservationService, ReservePolicy};
use turnstile_server::api::TicketApiState;
use turnstile_server::checkout::MockCheckoutProvider;
use turnstile_server::routes::ticket_api_router;

const SECRET: &str = "integration-secret";

struct TestApp {
    router: Router,
    store: Arc<MemoryInventoryStore>,
    bus: Arc<MemoryBus>,
    checkout: Arc<MockCheckoutProvider>,
}

fn test_app() -> TestApp {
    let store = Arc::new(MemoryInventoryStore::new());
    let bus = Arc::new(MemoryBus::new());
    let checkout = Arc::new(MockCheckoutProvider::new());

    let reservations = Arc::new(ReservationService::new(
        store.clone(),
        None,
        ReservePolicy {
            retry_delay: Duration::from_millis(1),
            ..ReservePolicy::default()
        },
    ));
    let publisher = BufferedPublisher::new(bus.clone(), 64, RetryPolicy::default());

    let state = TicketApiState {
        reservations,
        publisher,
        checkout: checkout.clone(),
        jwt_secret: Arc::new(SECRET.to_string()),
        frontend_url: "http://front.test".to_string(),
    };

    TestApp {
        router: ticket_api_router(state, "*"),
        store,
        bus,
        checkout,
    }
}

fn session_bearer() -> String {
    let token = token::mint_session(
        UserId::new(7),
        "ana",
        chrono::Duration::hours(1),
        SECRET.as_bytes(),
    )
    .unwrap();
    format!("Bearer {token}")
}

fn admission_token(event: &str) -> String {
    token::mint_admission(UserId::new(7), &EventId::new(event), SECRET.as_bytes()).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn reserve_request(event: &str, quantity: u32, token: &str, bearer: Option<&str>) -> Request<Body> {
    let body = serde_json::json!({
        "eventId": event,
        "ticketType": "basic",
        "quantity": quantity,
        "token": token,
    });
    let mut builder = Request::builder()
        .method("POST")
        .uri("/reserve-tickets")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(bearer) = bearer {
        builder = builder.header(header::AUTHORIZATION, bearer);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Wait for the buffered publisher's drain task to land `count` messages.
async fn published<T: serde::de::DeserializeOwned>(
    bus: &MemoryBus,
    queue: &str,
    count: usize,
) -> Vec<T> {
    for _ in 0..200 {
        if bus.published(queue).len() >= count {
            return bus.published_json(queue);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {count} messages on {queue}, got {}", bus.published(queue).len());
}

#[tokio::test]
async fn happy_path_reserves_and_returns_checkout_url() {
    let app = test_app();
    let event = EventId::new("E");
    app.store.seed(&event, "basic", 100);

    let (status, body) = send(
        &app,
        reserve_request("E", 2, &admission_token("E"), Some(&session_bearer())),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["checkoutUrl"]
        .as_str()
        .unwrap()
        .starts_with("https://checkout.test/session/"));

    // Counter decremented once.
    assert_eq!(app.store.get(&event, "basic").await.unwrap().unwrap().count, 98);

    // Exactly one order envelope, tied to the session user.
    let orders: Vec<OrderCreated> = published(&app.bus, ORDER_CREATED_QUEUE, 1).await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].user_id, UserId::new(7));
    assert_eq!(orders[0].quantity, 2);
    assert_eq!(orders[0].event_id, event);
    assert_eq!(orders[0].ticket_type, "basic");

    // One checkout session, wired to the same order reference.
    let sessions = app.checkout.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].0, orders[0].order_reference_id);
    assert_eq!(sessions[0].3, 2);
}

#[tokio::test]
async fn reserve_without_session_is_unauthorized() {
    let app = test_app();
    let event = EventId::new("E");
    app.store.seed(&event, "basic", 5);

    let (status, _) = send(&app, reserve_request("E", 1, &admission_token("E"), None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.get(&event, "basic").await.unwrap().unwrap().count, 5);
}

#[tokio::test]
async fn reserve_with_foreign_admission_token_is_unauthorized() {
    let app = test_app();
    let event = EventId::new("E");
    app.store.seed(&event, "basic", 5);

    let (status, body) = send(
        &app,
        reserve_request("E", 1, &admission_token("OTHER"), Some(&session_bearer())),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid admission token");
    assert_eq!(app.store.get(&event, "basic").await.unwrap().unwrap().count, 5);
}

#[tokio::test]
async fn reserve_more_than_available_is_rejected() {
    let app = test_app();
    let event = EventId::new("E");
    app.store.seed(&event, "basic", 1);

    let (status, body) = send(
        &app,
        reserve_request("E", 2, &admission_token("E"), Some(&session_bearer())),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "not enough tickets");
    assert_eq!(app.store.get(&event, "basic").await.unwrap().unwrap().count, 1);
    assert!(app.checkout.sessions().is_empty());
}

#[tokio::test]
async fn reserve_for_unknown_event_is_rejected() {
    let app = test_app();

    let (status, body) = send(
        &app,
        reserve_request("ghost", 1, &admission_token("ghost"), Some(&session_bearer())),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "concert not found");
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let app = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/reserve-tickets")
        .header(header::AUTHORIZATION, session_bearer())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid request body");
}

#[tokio::test]
async fn racing_for_the_last_ticket_sells_it_once() {
    let app = test_app();
    let event = EventId::new("E");
    app.store.seed(&event, "basic", 1);

    let first = send(
        &app,
        reserve_request("E", 1, &admission_token("E"), Some(&session_bearer())),
    );
    let second = send(
        &app,
        reserve_request("E", 1, &admission_token("E"), Some(&session_bearer())),
    );
    let (a, b) = tokio::join!(first, second);

    let successes = [&a, &b]
        .iter()
        .filter(|(status, _)| *status == StatusCode::OK)
        .count();
    assert_eq!(successes, 1);

    let (_, loser) = if a.0 == StatusCode::OK { b } else { a };
    let message = loser["message"].as_str().unwrap();
    assert!(
        message.contains("not enough tickets") || message.contains("too many retries"),
        "unexpected loser message: {message}"
    );

    assert_eq!(app.store.get(&event, "basic").await.unwrap().unwrap().count, 0);
}

#[tokio::test]
async fn availability_requires_both_parameters() {
    let app = test_app();

    let request = Request::builder()
        .uri("/get-available-tickets?eventId=E")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn availability_rejects_a_token_for_another_event() {
    let app = test_app();
    let event = EventId::new("E1");
    app.store.seed(&event, "basic", 42);

    let request = Request::builder()
        .uri(format!(
            "/get-available-tickets?eventId=E1&admission_token={}",
            admission_token("E2")
        ))
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid admission token");
}

#[tokio::test]
async fn availability_serves_the_basic_tier_count() {
    let app = test_app();
    let event = EventId::new("E1");
    app.store.seed(&event, "basic", 42);

    let request = Request::builder()
        .uri(format!(
            "/get-available-tickets?eventId=E1&admission_token={}",
            admission_token("E1")
        ))
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({
            "eventId": "E1",
            "availableTickets": [{ "ticketType": "basic", "quantity": 42 }],
        })
    );
}

#[tokio::test]
async fn payment_success_publishes_and_redirects() {
    let app = test_app();

    let request = Request::builder()
        .uri("/webhooks/payment-success?order_reference_id=ord-1")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "http://front.test/order-finished"
    );

    let events: Vec<PaymentSuccess> = published(&app.bus, PAYMENT_SUCCESS_QUEUE, 1).await;
    assert_eq!(events[0].order_reference_id.as_str(), "ord-1");
}

#[tokio::test]
async fn payment_cancel_publishes_the_cancelled_status() {
    let app = test_app();

    let request = Request::builder()
        .uri("/webhooks/payment-cancel?order_reference_id=ord-9")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let events: Vec<PaymentCancelled> = published(&app.bus, PAYMENT_CANCELLED_QUEUE, 1).await;
    assert_eq!(events[0].order_reference_id.as_str(), "ord-9");
    assert_eq!(events[0].status, "cancelled");
}

#[tokio::test]
async fn webhooks_require_the_order_reference() {
    let app = test_app();

    for path in ["/webhooks/payment-success", "/webhooks/payment-cancel"] {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
    }
}
