//! Payment HTTP handlers.
//!
//! This module implements the caller-facing payment endpoints:
//! - POST /payment/order/{order_id}/initiate - Start (or replay) a payment
//! - GET /payment/order/{order_id} - Payment for an order
//! - GET /payment/{payment_id} - Payment by id
//! - GET /payment/events - Webhook audit listing (admin)

use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::AppError,
    models::{
        order::CallerIdentity,
        payment::InitiatePaymentRequest,
        payment_event::{EventListQuery, PaymentEvent},
    },
    services::{payment_ledger::InitiateOutcome, payment_service::PaymentDetails},
};

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Start a payment for an order.
///
/// # Headers
///
/// `Idempotency-Key` (required): repeat the same key to retry safely.
///
/// # Request Body (optional)
///
/// Malformed JSON is answered with the standard `invalid_request` error body.
///
/// ```json
/// {
///   "provider": "mock",
///   "currency": "KZT",
///   "returnUrl": "https://shop.example/checkout/success",
///   "metadata": { "source": "web" }
/// }
/// ```
///
/// # Response
///
/// 201 Created for a new payment, 200 OK when the key replays an earlier one.
///
/// ```json
/// {
///   "payment": { "id": "550e8400-...", "status": "PENDING", ... },
///   "checkoutUrl": "https://shop.example/checkout/success?provider=mock&payment_id=mock_...",
///   "idempotent": false
/// }
/// ```
///
/// The use case runs on its own task so a dropped connection cannot abort
/// it between the checkout call and the insert.
pub async fn initiate_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(order_id): Path<i64>,
    headers: HeaderMap,
    body: Result<Option<Json<InitiatePaymentRequest>>, JsonRejection>,
) -> Result<(StatusCode, Json<InitiateOutcome>), AppError> {
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let request = body?.map(|Json(b)| b).unwrap_or_default();

    let service = state.payments.clone();
    let outcome = tokio::spawn(async move {
        service
            .initiate(order_id, &caller, idempotency_key, request)
            .await
    })
    .await??;

    let status = if outcome.idempotent {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(outcome)))
}

/// Get the payment for an order, with its webhook events.
pub async fn get_order_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(order_id): Path<i64>,
) -> Result<Json<PaymentDetails>, AppError> {
    let details = state.payments.get_by_order(order_id, &caller).await?;
    Ok(Json(details))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<PaymentDetails>, AppError> {
    let details = state.payments.get_by_id(payment_id, &caller).await?;
    Ok(Json(details))
}

/// List stored webhook events, newest first (max 200).
///
/// # Query Parameters
///
/// - `provider`: e.g. `mock`
/// - `paymentId`: payment UUID
/// - `providerEventId`: provider's event id
pub async fn list_events(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(query): Query<EventListQuery>,
) -> Result<Json<Vec<PaymentEvent>>, AppError> {
    let events = state.payments.list_events(&caller, query).await?;
    Ok(Json(events))
}
