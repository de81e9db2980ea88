//! Payment data models and the payment status state machine.
//!
//! This module defines:
//! - `Payment`: Database entity representing one attempt to collect funds for an order
//! - `PaymentStatus`: The closed status set and its allowed transitions
//! - `PaymentProvider`: The closed set of supported payment providers
//! - `InitiatePaymentRequest`: Request body for starting a payment
//!
//! # State Machine
//!
//! ```text
//! CREATED -> PENDING -> { SUCCEEDED | FAILED | CANCELED }
//! ```
//!
//! `CREATED` and `PENDING` are non-terminal. Once a payment reaches a terminal
//! status it never changes again, and a `PENDING` payment never goes back to
//! `CREATED`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Maximum length of a client-supplied idempotency key.
///
/// Matches the `VARCHAR(191)` column width.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 191;

/// Status of a payment.
///
/// Stored as an upper-case string in the `payments.status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Created,
    Pending,
    Succeeded,
    Failed,
    Canceled,
}

/// A status string that is not part of the domain status set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown payment status: {0}")]
pub struct UnknownStatus(pub String);

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Created,
        PaymentStatus::Pending,
        PaymentStatus::Succeeded,
        PaymentStatus::Failed,
        PaymentStatus::Canceled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Created => "CREATED",
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Succeeded => "SUCCEEDED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Canceled => "CANCELED",
        }
    }

    /// Whether the status is final (`SUCCEEDED`, `FAILED` or `CANCELED`).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PaymentStatus::Succeeded | PaymentStatus::Failed | PaymentStatus::Canceled
        )
    }

    /// Map a provider-reported status into the domain status set.
    ///
    /// Unrecognized values become `PENDING` so unknown webhook variants
    /// never block processing.
    pub fn from_provider(value: &str) -> Self {
        value.parse().unwrap_or(PaymentStatus::Pending)
    }

    /// Whether a payment currently in `self` may move to `next`.
    ///
    /// Terminal statuses are absorbing. Re-applying the current non-terminal
    /// status is allowed (it refreshes the last webhook summary).
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        !(self == PaymentStatus::Pending && next == PaymentStatus::Created)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(value.to_string()))
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Supported payment providers.
///
/// Adding a provider means adding a variant here and extending the match
/// arms in the provider gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Mock,
}

/// A provider identifier outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported payment provider: {0}")]
pub struct UnknownProvider(pub String);

impl PaymentProvider {
    pub const SUPPORTED: [PaymentProvider; 1] = [PaymentProvider::Mock];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentProvider::Mock => "mock",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentProvider {
    type Err = UnknownProvider;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        PaymentProvider::SUPPORTED
            .into_iter()
            .find(|provider| provider.as_str() == normalized)
            .ok_or(UnknownProvider(normalized))
    }
}

impl TryFrom<String> for PaymentProvider {
    type Error = UnknownProvider;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Represents a payment record from the database.
///
/// # Database Table
///
/// Maps to the `payments` table. Uniqueness is enforced by the database:
/// - one payment per `order_id`
/// - one payment per `(provider, idempotency_key)`
/// - one payment per `provider_payment_id` (when present)
///
/// `amount` and `currency` are copied from the order when the payment is
/// created and never change afterwards.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,

    /// Order this payment collects funds for
    pub order_id: i64,

    #[sqlx(try_from = "String")]
    pub provider: PaymentProvider,

    /// Amount in minor units (never floats!)
    pub amount: i64,

    /// Currency code (ISO 4217)
    pub currency: String,

    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,

    /// Identifier assigned by the provider's checkout session
    pub provider_payment_id: Option<String>,

    pub idempotency_key: String,

    /// Client metadata plus `checkout`, `checkoutUrl` and `lastWebhook`
    pub metadata: Value,

    pub paid_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Summary of the webhook that last touched a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSummary {
    pub event_type: String,
    pub provider_event_id: String,
}

/// The column values a webhook-driven transition writes.
///
/// Exactly one of the terminal timestamps is set for a terminal status and
/// all three are cleared otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub metadata: Value,
}

impl Payment {
    /// Checkout URL stored when the payment was created.
    pub fn checkout_url(&self) -> Option<String> {
        self.metadata
            .get("checkoutUrl")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Plan the update a webhook carrying `next` would make.
    ///
    /// Returns `None` when the transition is not allowed, in which case the
    /// payment row must be left untouched.
    pub fn plan_transition(
        &self,
        next: PaymentStatus,
        summary: &WebhookSummary,
        now: DateTime<Utc>,
    ) -> Option<StatusChange> {
        if !self.status.can_transition_to(next) {
            return None;
        }

        let (paid_at, failed_at, canceled_at) = match next {
            PaymentStatus::Succeeded => (Some(now), None, None),
            PaymentStatus::Failed => (None, Some(now), None),
            PaymentStatus::Canceled => (None, None, Some(now)),
            PaymentStatus::Created | PaymentStatus::Pending => (None, None, None),
        };

        let mut metadata = match &self.metadata {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        metadata.insert(
            "lastWebhook".to_string(),
            json!({
                "eventType": summary.event_type,
                "providerEventId": summary.provider_event_id,
            }),
        );

        Some(StatusChange {
            status: next,
            paid_at,
            failed_at,
            canceled_at,
            metadata: Value::Object(metadata),
        })
    }

    /// Apply a planned change in place.
    pub fn apply(&mut self, change: StatusChange, now: DateTime<Utc>) {
        self.status = change.status;
        self.paid_at = change.paid_at;
        self.failed_at = change.failed_at;
        self.canceled_at = change.canceled_at;
        self.metadata = change.metadata;
        self.updated_at = now;
    }
}

/// A payment about to be inserted.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub id: Uuid,
    pub order_id: i64,
    pub provider: PaymentProvider,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub provider_payment_id: Option<String>,
    pub idempotency_key: String,
    pub metadata: Value,
}

impl NewPayment {
    pub fn into_payment(self, now: DateTime<Utc>) -> Payment {
        Payment {
            id: self.id,
            order_id: self.order_id,
            provider: self.provider,
            amount: self.amount,
            currency: self.currency,
            status: self.status,
            provider_payment_id: self.provider_payment_id,
            idempotency_key: self.idempotency_key,
            metadata: self.metadata,
            paid_at: None,
            failed_at: None,
            canceled_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request body for initiating a payment.
///
/// The idempotency key travels in the `Idempotency-Key` header, not here.
///
/// # JSON Example
///
/// ```json
/// {
///   "provider": "mock",
///   "currency": "KZT",
///   "returnUrl": "https://shop.example/checkout/success",
///   "metadata": { "source": "web" }
/// }
/// ```
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    /// Defaults to `mock`
    pub provider: Option<String>,

    /// Defaults to the configured store currency
    pub currency: Option<String>,

    pub return_url: Option<String>,

    /// Must be a JSON object when present
    pub metadata: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment_with_status(status: PaymentStatus) -> Payment {
        NewPayment {
            id: Uuid::new_v4(),
            order_id: 10,
            provider: PaymentProvider::Mock,
            amount: 9900,
            currency: "KZT".to_string(),
            status,
            provider_payment_id: Some("mock_abc".to_string()),
            idempotency_key: "k1".to_string(),
            metadata: json!({ "checkoutUrl": "https://shop.local/ok?provider=mock" }),
        }
        .into_payment(Utc::now())
    }

    fn summary() -> WebhookSummary {
        WebhookSummary {
            event_type: "payment.succeeded".to_string(),
            provider_event_id: "evt-1".to_string(),
        }
    }

    #[test]
    fn provider_statuses_normalize_case_insensitively() {
        assert_eq!(PaymentStatus::from_provider("succeeded"), PaymentStatus::Succeeded);
        assert_eq!(PaymentStatus::from_provider(" Failed "), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_provider("canceled"), PaymentStatus::Canceled);
    }

    #[test]
    fn unknown_provider_status_falls_back_to_pending() {
        assert_eq!(PaymentStatus::from_provider("authorized"), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_provider(""), PaymentStatus::Pending);
    }

    #[test]
    fn terminal_statuses_are_absorbing() {
        for terminal in [
            PaymentStatus::Succeeded,
            PaymentStatus::Failed,
            PaymentStatus::Canceled,
        ] {
            assert!(terminal.is_terminal());
            for next in PaymentStatus::ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn pending_never_regresses_to_created() {
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Created));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Pending));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Succeeded));
        assert!(PaymentStatus::Created.can_transition_to(PaymentStatus::Failed));
    }

    #[test]
    fn succeeded_transition_sets_only_paid_at() {
        let payment = payment_with_status(PaymentStatus::Pending);
        let now = Utc::now();

        let change = payment
            .plan_transition(PaymentStatus::Succeeded, &summary(), now)
            .expect("pending payments may succeed");

        assert_eq!(change.status, PaymentStatus::Succeeded);
        assert_eq!(change.paid_at, Some(now));
        assert_eq!(change.failed_at, None);
        assert_eq!(change.canceled_at, None);
    }

    #[test]
    fn canceled_transition_sets_only_canceled_at() {
        let payment = payment_with_status(PaymentStatus::Created);
        let now = Utc::now();

        let change = payment
            .plan_transition(PaymentStatus::Canceled, &summary(), now)
            .unwrap();

        assert_eq!(change.paid_at, None);
        assert_eq!(change.failed_at, None);
        assert_eq!(change.canceled_at, Some(now));
    }

    #[test]
    fn transition_merges_last_webhook_into_metadata() {
        let payment = payment_with_status(PaymentStatus::Pending);

        let change = payment
            .plan_transition(PaymentStatus::Failed, &summary(), Utc::now())
            .unwrap();

        assert_eq!(
            change.metadata["checkoutUrl"],
            "https://shop.local/ok?provider=mock"
        );
        assert_eq!(change.metadata["lastWebhook"]["providerEventId"], "evt-1");
        assert_eq!(change.metadata["lastWebhook"]["eventType"], "payment.succeeded");
    }

    #[test]
    fn stale_event_after_terminal_status_is_not_planned() {
        let payment = payment_with_status(PaymentStatus::Succeeded);

        assert!(
            payment
                .plan_transition(PaymentStatus::Pending, &summary(), Utc::now())
                .is_none()
        );
    }

    #[test]
    fn provider_parsing_is_trimmed_and_case_insensitive() {
        assert_eq!(" MOCK ".parse::<PaymentProvider>(), Ok(PaymentProvider::Mock));
        assert_eq!(
            "stripe".parse::<PaymentProvider>(),
            Err(UnknownProvider("stripe".to_string()))
        );
    }

    #[test]
    fn payment_serializes_with_camel_case_keys() {
        let payment = payment_with_status(PaymentStatus::Pending);
        let value = serde_json::to_value(&payment).unwrap();

        assert_eq!(value["status"], "PENDING");
        assert_eq!(value["provider"], "mock");
        assert_eq!(value["orderId"], 10);
        assert!(value.get("providerPaymentId").is_some());
    }
}
