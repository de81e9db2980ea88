//! Provider webhook receiver.
//!
//! The body is taken as raw bytes: the signature covers the exact bytes the
//! provider sent, so nothing parses the body before verification.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};

use crate::{
    app::AppState,
    error::AppError,
    models::payment_event::WebhookAck,
    services::signature,
};

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Receive a provider webhook.
///
/// # Endpoint
///
/// `POST /payment/webhook/{provider}`
///
/// # Process
///
/// 1. Verify `X-Webhook-Signature` (hex HMAC-SHA256 of the body)
/// 2. Normalize and record the event exactly once
/// 3. Acknowledge; redeliveries are acknowledged with `duplicate: true`
///
/// # Response (200)
///
/// ```json
/// { "ok": true, "duplicate": false, "paymentId": "550e8400-...", "eventId": "770e8400-..." }
/// ```
///
/// # Errors
///
/// - 403 for a missing or wrong signature
/// - 400 for an unknown provider, empty body, invalid JSON or missing identifiers
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !signature::verify(&body, provided, &state.webhook_secret)? {
        tracing::warn!(provider = %provider, "webhook signature rejected");
        return Err(AppError::InvalidSignature);
    }

    let service = state.payments.clone();
    let outcome =
        tokio::spawn(async move { service.process_webhook_event(&provider, &body).await })
            .await??;

    Ok(Json(WebhookAck {
        ok: true,
        duplicate: outcome.duplicate,
        payment_id: outcome.payment.map(|p| p.id),
        event_id: outcome.event.id,
    }))
}
