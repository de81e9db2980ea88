//! Persistence ports for payments and orders.
//!
//! The payment ledger only talks to storage through these traits. All
//! serialization between concurrent requests is delegated to the store's
//! transactions and uniqueness constraints; nothing here caches state.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    order::Order,
    payment::{NewPayment, Payment, PaymentProvider},
    payment_event::{EventFilter, NormalizedWebhookEvent, PaymentEvent},
};

pub use memory::{InMemoryOrders, InMemoryPaymentStore};
pub use postgres::{PgOrderReader, PgPaymentStore};

/// Storage errors surfaced to the ledger.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness constraint rejected a write. Holds the constraint name.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
}

/// Result of recording a webhook event.
#[derive(Debug, Clone)]
pub struct WebhookRecord {
    /// Payment matched by `(provider, provider_payment_id)`, after the update
    pub payment: Option<Payment>,

    pub event: PaymentEvent,

    /// Whether the payment row was updated by this event
    pub applied: bool,
}

/// Storage port for payments and their webhook events.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<Payment>, StoreError>;

    async fn find_by_order(&self, order_id: i64) -> Result<Option<Payment>, StoreError>;

    async fn find_by_idempotency_key(
        &self,
        provider: PaymentProvider,
        idempotency_key: &str,
    ) -> Result<Option<Payment>, StoreError>;

    /// Insert a payment.
    ///
    /// Fails with `UniqueViolation` when another payment already holds the
    /// order, the `(provider, idempotency_key)` pair or the provider payment id.
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError>;

    async fn find_event(
        &self,
        provider: PaymentProvider,
        provider_event_id: &str,
    ) -> Result<Option<PaymentEvent>, StoreError>;

    /// Record a webhook event and apply its status to the matching payment.
    ///
    /// Both writes happen in one unit of work: either the payment update and
    /// the event row are both persisted or neither is. The payment row is
    /// locked while the transition is decided. Fails with `UniqueViolation`
    /// when the event was already recorded.
    async fn record_webhook(
        &self,
        event: &NormalizedWebhookEvent,
    ) -> Result<WebhookRecord, StoreError>;

    /// Events linked to a payment, oldest first.
    async fn events_for_payment(&self, payment_id: Uuid) -> Result<Vec<PaymentEvent>, StoreError>;

    /// Events matching `filter`, newest first, at most `limit` rows.
    async fn list_events(
        &self,
        filter: &EventFilter,
        limit: i64,
    ) -> Result<Vec<PaymentEvent>, StoreError>;

    /// Connectivity probe for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Read access to the order subsystem.
#[async_trait]
pub trait OrderReader: Send + Sync {
    async fn find_order(&self, order_id: i64) -> Result<Option<Order>, StoreError>;
}
