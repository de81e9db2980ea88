//! Payment event models for inbound provider webhooks.
//!
//! A `PaymentEvent` is stored exactly once per `(provider, provider_event_id)`
//! no matter how many times the provider delivers the same notification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::payment::{PaymentProvider, PaymentStatus, WebhookSummary};

/// Represents a processed webhook notification from the database.
///
/// # Database Table
///
/// Maps to the `payment_events` table. `payment_id` is NULL when the event
/// arrived for a provider payment this service does not know about (yet);
/// the row is still kept for audit and replay.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    pub id: Uuid,
    pub payment_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub provider: PaymentProvider,
    pub provider_event_id: String,
    pub event_type: String,
    /// Provider payload as received
    pub payload: Value,
    pub processed_at: DateTime<Utc>,
}

/// A webhook event translated into the domain vocabulary by the provider gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedWebhookEvent {
    pub provider: PaymentProvider,
    pub provider_event_id: String,
    pub provider_payment_id: String,
    pub event_type: String,
    pub status: PaymentStatus,
    pub payload: Value,
}

impl NormalizedWebhookEvent {
    pub fn summary(&self) -> WebhookSummary {
        WebhookSummary {
            event_type: self.event_type.clone(),
            provider_event_id: self.provider_event_id.clone(),
        }
    }

    pub fn into_event(self, id: Uuid, payment_id: Option<Uuid>, now: DateTime<Utc>) -> PaymentEvent {
        PaymentEvent {
            id,
            payment_id,
            provider: self.provider,
            provider_event_id: self.provider_event_id,
            event_type: self.event_type,
            payload: self.payload,
            processed_at: now,
        }
    }
}

/// Filters for the event audit listing.
#[derive(Debug, Default, Clone)]
pub struct EventFilter {
    pub provider: Option<PaymentProvider>,
    pub payment_id: Option<Uuid>,
    pub provider_event_id: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, event: &PaymentEvent) -> bool {
        self.provider.is_none_or(|provider| event.provider == provider)
            && self.payment_id.is_none_or(|id| event.payment_id == Some(id))
            && self
                .provider_event_id
                .as_deref()
                .is_none_or(|id| event.provider_event_id == id)
    }
}

/// Query string for `GET /payment/events`.
///
/// # Example
///
/// `/payment/events?provider=mock&paymentId=550e8400-e29b-41d4-a716-446655440000`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListQuery {
    pub provider: Option<String>,
    pub payment_id: Option<Uuid>,
    pub provider_event_id: Option<String>,
}

/// Response body acknowledging a webhook delivery.
///
/// ```json
/// { "ok": true, "duplicate": false, "paymentId": "…", "eventId": "…" }
/// ```
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub ok: bool,
    pub duplicate: bool,
    pub payment_id: Option<Uuid>,
    pub event_id: Uuid,
}
