//! Provider gateway - translation between the payment domain and providers.
//!
//! This is the only provider-aware component. It:
//! - Creates checkout sessions for a provider
//! - Normalizes provider webhook payloads into `NormalizedWebhookEvent`
//!
//! Providers are a closed set (`PaymentProvider`). Adding one means adding
//! match arms here; nothing else in the crate looks at provider specifics.

use std::time::Duration;

use serde_json::{Value, json};

use crate::models::{
    payment::{PaymentProvider, PaymentStatus},
    payment_event::NormalizedWebhookEvent,
};

/// Event type used when a provider payload does not name one.
const DEFAULT_EVENT_TYPE: &str = "payment.updated";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("Unsupported payment provider: {0}")]
    UnsupportedProvider(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    /// The provider did not answer within the configured bound. Safe to retry
    /// with the same idempotency key.
    #[error("Payment provider {0} timed out")]
    Timeout(PaymentProvider),
}

/// Parse a provider identifier, defaulting to `mock` when absent.
pub fn normalize_provider(raw: Option<&str>) -> Result<PaymentProvider, GatewayError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("mock");
    raw.parse::<PaymentProvider>()
        .map_err(|err| GatewayError::UnsupportedProvider(err.0))
}

/// Input for a checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub provider: PaymentProvider,
    pub order_id: i64,
    pub amount: i64,
    pub currency: &'a str,
    pub return_url: Option<&'a str>,
}

/// A checkout session created at the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    /// Unique per call, namespaced by provider
    pub provider_payment_id: String,

    /// Where the customer completes payment; `None` without a return URL
    pub checkout_url: Option<String>,

    /// Initial status reported by the provider
    pub status: PaymentStatus,

    pub metadata: Value,
}

/// Gateway to the supported payment providers.
///
/// # Timeout
///
/// Checkout creation is bounded by `timeout`; an elapsed bound surfaces as
/// `GatewayError::Timeout` instead of hanging the request.
#[derive(Debug, Clone)]
pub struct ProviderGateway {
    timeout: Duration,
}

impl ProviderGateway {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Create a checkout session at the requested provider.
    pub async fn create_checkout_session(
        &self,
        request: CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, GatewayError> {
        let provider = request.provider;
        let session = async {
            match provider {
                PaymentProvider::Mock => mock::create_checkout(&request).await,
            }
        };

        tokio::time::timeout(self.timeout, session)
            .await
            .map_err(|_| GatewayError::Timeout(provider))?
    }

    /// Translate a provider webhook payload into the domain vocabulary.
    ///
    /// # Errors
    ///
    /// - `InvalidPayload`: payload is not an object, or the event id or
    ///   provider payment id is missing
    pub fn normalize_webhook_event(
        &self,
        provider: PaymentProvider,
        payload: Value,
    ) -> Result<NormalizedWebhookEvent, GatewayError> {
        if !payload.is_object() {
            return Err(GatewayError::InvalidPayload(
                "webhook payload must be a JSON object".to_string(),
            ));
        }

        match provider {
            PaymentProvider::Mock => mock::normalize_event(payload),
        }
    }
}

mod mock {
    use super::*;

    /// Generate a provider payment id: `mock_` + 32 random hex chars.
    fn generate_payment_id() -> String {
        let bytes: [u8; 16] = rand::random();
        format!("mock_{}", hex::encode(bytes))
    }

    pub(super) async fn create_checkout(
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, GatewayError> {
        let provider_payment_id = generate_payment_id();
        let checkout_url = request.return_url.map(|url| {
            let separator = if url.contains('?') { '&' } else { '?' };
            format!("{url}{separator}provider=mock&payment_id={provider_payment_id}")
        });

        Ok(CheckoutSession {
            provider_payment_id,
            checkout_url,
            status: PaymentStatus::Pending,
            metadata: json!({
                "mode": "mock",
                "orderId": request.order_id,
                "amount": request.amount,
                "currency": request.currency,
            }),
        })
    }

    /// First non-empty identifier among `keys`. Numbers are accepted too.
    fn identifier(payload: &Value, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| match payload.get(*key) {
                Some(Value::String(s)) => Some(s.trim().to_string()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .find(|id| !id.is_empty())
    }

    pub(super) fn normalize_event(payload: Value) -> Result<NormalizedWebhookEvent, GatewayError> {
        let provider_event_id = identifier(&payload, &["eventId", "id", "event_id"])
            .ok_or_else(|| GatewayError::InvalidPayload("missing providerEventId".to_string()))?;
        let provider_payment_id =
            identifier(&payload, &["paymentId", "payment_id", "providerPaymentId"]).ok_or_else(
                || GatewayError::InvalidPayload("missing providerPaymentId".to_string()),
            )?;

        let event_type = payload
            .get("type")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_EVENT_TYPE)
            .to_string();

        let status = payload
            .get("status")
            .and_then(Value::as_str)
            .map(PaymentStatus::from_provider)
            .unwrap_or(PaymentStatus::Pending);

        Ok(NormalizedWebhookEvent {
            provider: PaymentProvider::Mock,
            provider_event_id,
            provider_payment_id,
            event_type,
            status,
            payload,
        })
    }
}
