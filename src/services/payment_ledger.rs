//! Payment ledger - idempotent payment creation and webhook processing.
//!
//! This module handles:
//! - Creating at most one payment per order and per idempotency key
//! - Recording each provider event exactly once
//! - Applying webhook-driven status transitions
//!
//! # Concurrency
//!
//! There are no in-process locks. Lookups before a write are only a fast
//! path; the storage layer's unique constraints decide races, and a losing
//! writer re-reads the winning row and answers as if it had found it first.

use serde::Serialize;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        order::Order,
        payment::{NewPayment, Payment, PaymentProvider},
        payment_event::{NormalizedWebhookEvent, PaymentEvent},
    },
    services::gateway::{CheckoutRequest, ProviderGateway},
    services::validation,
    store::{PaymentStore, StoreError},
};

/// Validated input for creating a payment.
#[derive(Debug, Clone)]
pub struct NewPaymentRequest {
    pub order: Order,
    pub provider: PaymentProvider,
    /// Raw `Idempotency-Key` header value
    pub idempotency_key: Option<String>,
    pub currency: String,
    pub return_url: Option<String>,
    pub metadata: Map<String, Value>,
}

/// Result of `initiate`.
///
/// `idempotent` is true when an earlier call with the same key already
/// created the payment; callers treat that as success, not a new resource.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateOutcome {
    pub payment: Payment,
    pub checkout_url: Option<String>,
    pub idempotent: bool,
}

/// Result of `process_webhook_event`.
#[derive(Debug, Clone)]
pub struct WebhookOutcome {
    pub payment: Option<Payment>,
    pub event: PaymentEvent,
    /// The event had already been processed; nothing was written
    pub duplicate: bool,
    /// The payment's status was updated by this event
    pub applied: bool,
}

/// Create a payment for an order, or return the one an earlier call created.
///
/// # Process
///
/// 1. Require a non-blank idempotency key
/// 2. Same `(provider, key)` and same order: return it with `idempotent = true`
/// 3. Same `(provider, key)` but another order: `IdempotencyKeyReused`
/// 4. Order already paid under another key: `PaymentAlreadyExists`
/// 5. Create a checkout session and insert the payment
///
/// A unique violation on insert means a concurrent request won the race;
/// steps 2-4 are re-evaluated against the stored row.
pub async fn initiate(
    store: &dyn PaymentStore,
    gateway: &ProviderGateway,
    request: NewPaymentRequest,
) -> Result<InitiateOutcome, AppError> {
    let idempotency_key = validation::normalize_idempotency_key(request.idempotency_key.as_deref())?;
    let order_id = request.order.id;

    if let Some(existing) = store
        .find_by_idempotency_key(request.provider, &idempotency_key)
        .await?
    {
        return idempotent_hit(existing, order_id);
    }

    if let Some(existing) = store.find_by_order(order_id).await? {
        return existing_for_order(existing, request.provider, &idempotency_key);
    }

    let checkout = gateway
        .create_checkout_session(CheckoutRequest {
            provider: request.provider,
            order_id,
            amount: request.order.amount,
            currency: &request.currency,
            return_url: request.return_url.as_deref(),
        })
        .await?;

    let mut metadata = request.metadata;
    metadata.insert("checkout".to_string(), checkout.metadata);
    metadata.insert("checkoutUrl".to_string(), json!(checkout.checkout_url));

    let new_payment = NewPayment {
        id: Uuid::new_v4(),
        order_id,
        provider: request.provider,
        amount: request.order.amount,
        currency: request.currency,
        status: checkout.status,
        provider_payment_id: Some(checkout.provider_payment_id),
        idempotency_key: idempotency_key.clone(),
        metadata: Value::Object(metadata),
    };

    match store.insert_payment(new_payment).await {
        Ok(payment) => {
            tracing::info!(
                order_id,
                payment_id = %payment.id,
                provider = %payment.provider,
                status = %payment.status,
                "payment created"
            );
            Ok(InitiateOutcome {
                payment,
                checkout_url: checkout.checkout_url,
                idempotent: false,
            })
        }
        Err(StoreError::UniqueViolation(constraint)) => {
            tracing::debug!(order_id, constraint, "payment insert lost a race");
            resolve_insert_conflict(store, request.provider, &idempotency_key, order_id).await
        }
        Err(err) => Err(err.into()),
    }
}

fn idempotent_hit(existing: Payment, order_id: i64) -> Result<InitiateOutcome, AppError> {
    if existing.order_id != order_id {
        tracing::warn!(
            order_id,
            other_order_id = existing.order_id,
            "idempotency key reused across orders"
        );
        return Err(AppError::IdempotencyKeyReused);
    }

    Ok(InitiateOutcome {
        checkout_url: existing.checkout_url(),
        payment: existing,
        idempotent: true,
    })
}

/// The order already has a payment. It is this request's own payment when it
/// carries the same `(provider, key)`; a concurrent duplicate may have
/// committed between the key lookup and the order lookup.
fn existing_for_order(
    existing: Payment,
    provider: PaymentProvider,
    idempotency_key: &str,
) -> Result<InitiateOutcome, AppError> {
    if existing.provider == provider && existing.idempotency_key == idempotency_key {
        let order_id = existing.order_id;
        return idempotent_hit(existing, order_id);
    }

    tracing::warn!(order_id = existing.order_id, "payment already exists for order");
    Err(AppError::PaymentAlreadyExists)
}

async fn resolve_insert_conflict(
    store: &dyn PaymentStore,
    provider: PaymentProvider,
    idempotency_key: &str,
    order_id: i64,
) -> Result<InitiateOutcome, AppError> {
    if let Some(existing) = store
        .find_by_idempotency_key(provider, idempotency_key)
        .await?
    {
        return idempotent_hit(existing, order_id);
    }

    if let Some(existing) = store.find_by_order(order_id).await? {
        return existing_for_order(existing, provider, idempotency_key);
    }

    Err(AppError::Internal(
        "payment insert conflicted without a visible conflicting row".to_string(),
    ))
}

/// Consume a provider webhook exactly once.
///
/// # Process
///
/// 1. Normalize the payload through the gateway
/// 2. Already recorded `(provider, provider_event_id)`: return the stored
///    event with `duplicate = true` and write nothing
/// 3. Otherwise record the event and apply its status atomically
///
/// A concurrent delivery of the same event loses on the unique index and is
/// answered as a duplicate.
pub async fn process_webhook_event(
    store: &dyn PaymentStore,
    gateway: &ProviderGateway,
    provider: PaymentProvider,
    payload: Value,
) -> Result<WebhookOutcome, AppError> {
    let event = gateway.normalize_webhook_event(provider, payload)?;

    if let Some(stored) = store
        .find_event(event.provider, &event.provider_event_id)
        .await?
    {
        return replay(store, stored).await;
    }

    match store.record_webhook(&event).await {
        Ok(record) => {
            log_recorded(&event, record.payment.as_ref(), record.applied);
            Ok(WebhookOutcome {
                payment: record.payment,
                event: record.event,
                duplicate: false,
                applied: record.applied,
            })
        }
        Err(StoreError::UniqueViolation(_)) => {
            let stored = store
                .find_event(event.provider, &event.provider_event_id)
                .await?
                .ok_or_else(|| {
                    AppError::Internal("webhook event conflicted but is not stored".to_string())
                })?;
            replay(store, stored).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn replay(store: &dyn PaymentStore, stored: PaymentEvent) -> Result<WebhookOutcome, AppError> {
    tracing::debug!(
        provider = %stored.provider,
        provider_event_id = %stored.provider_event_id,
        "duplicate webhook delivery"
    );

    let payment = match stored.payment_id {
        Some(payment_id) => store.find_by_id(payment_id).await?,
        None => None,
    };

    Ok(WebhookOutcome {
        payment,
        event: stored,
        duplicate: true,
        applied: false,
    })
}

fn log_recorded(event: &NormalizedWebhookEvent, payment: Option<&Payment>, applied: bool) {
    match payment {
        Some(payment) if applied => tracing::info!(
            payment_id = %payment.id,
            provider_event_id = %event.provider_event_id,
            status = %payment.status,
            "payment status updated from webhook"
        ),
        Some(payment) => tracing::warn!(
            payment_id = %payment.id,
            provider_event_id = %event.provider_event_id,
            current = %payment.status,
            requested = %event.status,
            "webhook transition ignored"
        ),
        None => tracing::info!(
            provider_event_id = %event.provider_event_id,
            provider_payment_id = %event.provider_payment_id,
            "webhook recorded without matching payment"
        ),
    }
}
