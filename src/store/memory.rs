//! In-memory implementations of the storage ports.
//!
//! Used by tests and local experiments. Every operation runs under one
//! mutex, and the same uniqueness constraints as the PostgreSQL schema are
//! checked before anything is mutated, so a rejected write leaves no trace.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    models::{
        order::Order,
        payment::{NewPayment, Payment, PaymentProvider},
        payment_event::{EventFilter, NormalizedWebhookEvent, PaymentEvent},
    },
    store::{OrderReader, PaymentStore, StoreError, WebhookRecord},
};

#[derive(Debug, Default)]
struct Tables {
    payments: Vec<Payment>,
    events: Vec<PaymentEvent>,
}

/// Payment store holding rows in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored payment.
    pub async fn payments(&self) -> Vec<Payment> {
        self.tables.lock().await.payments.clone()
    }

    /// Snapshot of every stored event.
    pub async fn events(&self) -> Vec<PaymentEvent> {
        self.tables.lock().await.events.clone()
    }
}

fn violated_constraint(tables: &Tables, payment: &NewPayment) -> Option<&'static str> {
    tables.payments.iter().find_map(|existing| {
        if existing.order_id == payment.order_id {
            Some("payments_order_id_unique")
        } else if existing.provider == payment.provider
            && existing.idempotency_key == payment.idempotency_key
        {
            Some("payments_provider_idempotency_unique")
        } else if payment.provider_payment_id.is_some()
            && existing.provider_payment_id == payment.provider_payment_id
        {
            Some("payments_provider_payment_id_unique")
        } else {
            None
        }
    })
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<Payment>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.payments.iter().find(|p| p.id == payment_id).cloned())
    }

    async fn find_by_order(&self, order_id: i64) -> Result<Option<Payment>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .payments
            .iter()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        provider: PaymentProvider,
        idempotency_key: &str,
    ) -> Result<Option<Payment>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .payments
            .iter()
            .find(|p| p.provider == provider && p.idempotency_key == idempotency_key)
            .cloned())
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let mut tables = self.tables.lock().await;

        if let Some(constraint) = violated_constraint(&tables, &payment) {
            return Err(StoreError::UniqueViolation(constraint.to_string()));
        }

        let payment = payment.into_payment(Utc::now());
        tables.payments.push(payment.clone());
        Ok(payment)
    }

    async fn find_event(
        &self,
        provider: PaymentProvider,
        provider_event_id: &str,
    ) -> Result<Option<PaymentEvent>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .events
            .iter()
            .find(|e| e.provider == provider && e.provider_event_id == provider_event_id)
            .cloned())
    }

    async fn record_webhook(
        &self,
        event: &NormalizedWebhookEvent,
    ) -> Result<WebhookRecord, StoreError> {
        let mut tables = self.tables.lock().await;

        let already_recorded = tables.events.iter().any(|e| {
            e.provider == event.provider && e.provider_event_id == event.provider_event_id
        });
        if already_recorded {
            return Err(StoreError::UniqueViolation(
                "payment_events_provider_event_unique".to_string(),
            ));
        }

        let now = Utc::now();
        let mut applied = false;
        let payment = tables
            .payments
            .iter_mut()
            .find(|p| {
                p.provider == event.provider
                    && p.provider_payment_id.as_deref() == Some(event.provider_payment_id.as_str())
            })
            .map(|payment| {
                if let Some(change) = payment.plan_transition(event.status, &event.summary(), now) {
                    payment.apply(change, now);
                    applied = true;
                }
                payment.clone()
            });

        let stored = event
            .clone()
            .into_event(Uuid::new_v4(), payment.as_ref().map(|p| p.id), now);
        tables.events.push(stored.clone());

        Ok(WebhookRecord {
            payment,
            event: stored,
            applied,
        })
    }

    async fn events_for_payment(&self, payment_id: Uuid) -> Result<Vec<PaymentEvent>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .events
            .iter()
            .filter(|e| e.payment_id == Some(payment_id))
            .cloned()
            .collect())
    }

    async fn list_events(
        &self,
        filter: &EventFilter,
        limit: i64,
    ) -> Result<Vec<PaymentEvent>, StoreError> {
        let tables = self.tables.lock().await;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(tables
            .events
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Order reader over a fixed set of orders.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrders {
    orders: Arc<Mutex<HashMap<i64, Order>>>,
}

impl InMemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, order: Order) {
        self.orders.lock().await.insert(order.id, order);
    }
}

#[async_trait]
impl OrderReader for InMemoryOrders {
    async fn find_order(&self, order_id: i64) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.lock().await.get(&order_id).cloned())
    }
}
