//! Checkout-session creation against the external payment processor.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;
use turnstile_core::{EventId, OrderReferenceId};

/// Price charged per ticket, in cents. Pricing proper is out of scope;
/// every tier sells at this flat amount.
const TICKET_PRICE_CENTS: i64 = 5000;

/// Outbound request timeout for the processor call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a checkout session could not be created.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// The HTTP call itself failed.
    #[error("failed to call payment API: {0}")]
    Request(#[from] reqwest::Error),
    /// The processor answered with a non-success status.
    #[error("payment API returned status {0}")]
    Status(u16),
}

/// A single purchasable line in the checkout session.
#[derive(Debug, Serialize)]
pub struct LineItem {
    /// Display name.
    pub name: String,
    /// Display description.
    pub description: String,
    /// Unit price in cents.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Units purchased.
    pub quantity: i64,
}

/// Request body for `POST /v1/checkout/sessions`.
#[derive(Debug, Serialize)]
pub struct CheckoutSessionRequest {
    /// Lines to charge.
    pub line_items: Vec<LineItem>,
    /// Where the processor sends the buyer on success.
    pub success_url: String,
    /// Where the processor sends the buyer on cancel.
    pub cancel_url: String,
    /// Opaque key/value passthrough.
    pub metadata: HashMap<String, String>,
}

/// Response body from the processor.
#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    /// Processor-side session id.
    pub id: String,
    /// Hosted checkout page for the buyer.
    pub url: String,
    /// Session status as reported by the processor.
    pub status: String,
}

/// Creates hosted checkout sessions.
///
/// Abstraction over the external payment processor, with explicit
/// `Pin<Box<dyn Future>>` returns instead of `async fn` so it can be used
/// as a trait object (`Arc<dyn CheckoutProvider>`) in the API state.
pub trait CheckoutProvider: Send + Sync {
    /// Create a session for `quantity` `tier` tickets of `event_id`,
    /// wiring the success/cancel callbacks to `order_reference_id`.
    ///
    /// The returned future resolves to the hosted checkout URL, or to
    /// [`CheckoutError`] when the processor is unreachable or answers with
    /// a non-success status.
    fn create_session(
        &self,
        order_reference_id: &OrderReferenceId,
        event_id: &EventId,
        tier: &str,
        quantity: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String, CheckoutError>> + Send>>;
}

/// Production provider talking HTTP to the payment processor.
pub struct HttpCheckoutClient {
    http: reqwest::Client,
    processor_url: String,
    callback_base_url: String,
}

impl HttpCheckoutClient {
    /// Build a client for the processor at `processor_url`; callback URLs
    /// are rooted at `callback_base_url`.
    #[must_use]
    pub fn new(processor_url: String, callback_base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            processor_url,
            callback_base_url,
        }
    }
}

impl CheckoutProvider for HttpCheckoutClient {
    fn create_session(
        &self,
        order_reference_id: &OrderReferenceId,
        event_id: &EventId,
        tier: &str,
        quantity: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String, CheckoutError>> + Send>> {
        let success_url = format!(
            "{}/webhooks/payment-success?order_reference_id={order_reference_id}",
            self.callback_base_url
        );
        let cancel_url = format!(
            "{}/webhooks/payment-cancel?order_reference_id={order_reference_id}",
            self.callback_base_url
        );

        let payload = CheckoutSessionRequest {
            line_items: vec![LineItem {
                name: format!("{tier} Ticket - Event {event_id}"),
                description: format!("{tier} tier ticket"),
                amount: TICKET_PRICE_CENTS,
                currency: "usd".to_string(),
                quantity: i64::from(quantity),
            }],
            success_url,
            cancel_url,
            metadata: HashMap::new(),
        };

        let http = self.http.clone();
        let endpoint = format!("{}/v1/checkout/sessions", self.processor_url);

        Box::pin(async move {
            let response = http.post(endpoint).json(&payload).send().await?;

            if !response.status().is_success() {
                return Err(CheckoutError::Status(response.status().as_u16()));
            }

            let session: CheckoutSession = response.json().await?;
            tracing::info!(
                session_id = %session.id,
                status = %session.status,
                url = %session.url,
                "created checkout session"
            );
            Ok(session.url)
        })
    }
}

/// Test double: records every request and answers with a synthetic URL.
#[derive(Default)]
pub struct MockCheckoutProvider {
    sessions: Mutex<Vec<(OrderReferenceId, EventId, String, u32)>>,
}

impl MockCheckoutProvider {
    /// Create an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions created so far.
    #[must_use]
    pub fn sessions(&self) -> Vec<(OrderReferenceId, EventId, String, u32)> {
        self.sessions.lock().expect("checkout lock poisoned").clone()
    }
}

impl CheckoutProvider for MockCheckoutProvider {
    fn create_session(
        &self,
        order_reference_id: &OrderReferenceId,
        event_id: &EventId,
        tier: &str,
        quantity: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String, CheckoutError>> + Send>> {
        self.sessions.lock().expect("checkout lock poisoned").push((
            order_reference_id.clone(),
            event_id.clone(),
            tier.to_owned(),
            quantity,
        ));
        let url = format!("https://checkout.test/session/{order_reference_id}");
        Box::pin(std::future::ready(Ok(url)))
    }
}
