//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::services::{gateway::GatewayError, signature::SignatureError};
use crate::store::StoreError;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Validation**: bad idempotency key, currency, metadata, return URL or webhook body
/// - **Authentication**: missing or invalid caller identity
/// - **Authorization**: access guard denial or a bad webhook signature
/// - **Resources**: order or payment absent
/// - **Conflicts**: idempotency key reuse, second payment for an order
/// - **Infrastructure**: storage, configuration and provider timeouts
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Storage operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No caller identity, or the token could not be verified.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller may not access the order.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("{0}")]
    Forbidden(String),

    /// Webhook body did not match its `X-Webhook-Signature`.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Payment not found")]
    PaymentNotFound,

    #[error("Idempotency-Key header is required")]
    MissingIdempotencyKey,

    /// Request body, header or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("{0}")]
    InvalidRequest(String),

    /// Webhook payload is malformed or lacks required identifiers.
    #[error("{0}")]
    InvalidPayload(String),

    #[error("{0}")]
    UnsupportedProvider(String),

    /// The idempotency key already belongs to a payment for another order.
    #[error("Idempotency-Key was already used for another order")]
    IdempotencyKeyReused,

    /// The order already has a payment under a different idempotency key.
    #[error("A payment already exists for this order")]
    PaymentAlreadyExists,

    /// The provider did not answer in time; the client may retry.
    ///
    /// Returns HTTP 503 Service Unavailable.
    #[error("Payment provider timed out")]
    GatewayTimeout,

    /// Server-side misconfiguration (e.g. missing webhook secret).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invariant broken or background task failed.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::UnsupportedProvider(_) => AppError::UnsupportedProvider(err.to_string()),
            GatewayError::InvalidPayload(_) => AppError::InvalidPayload(err.to_string()),
            GatewayError::Timeout(_) => AppError::GatewayTimeout,
        }
    }
}

impl From<SignatureError> for AppError {
    fn from(err: SignatureError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("payment task failed: {err}"))
    }
}

impl AppError {
    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::InvalidSignature => (StatusCode::FORBIDDEN, "invalid_signature"),
            AppError::OrderNotFound => (StatusCode::NOT_FOUND, "order_not_found"),
            AppError::PaymentNotFound => (StatusCode::NOT_FOUND, "payment_not_found"),
            AppError::MissingIdempotencyKey => {
                (StatusCode::BAD_REQUEST, "missing_idempotency_key")
            }
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::InvalidPayload(_) => (StatusCode::BAD_REQUEST, "invalid_payload"),
            AppError::UnsupportedProvider(_) => (StatusCode::BAD_REQUEST, "unsupported_provider"),
            AppError::IdempotencyKeyReused => (StatusCode::BAD_REQUEST, "idempotency_key_reused"),
            AppError::PaymentAlreadyExists => (StatusCode::BAD_REQUEST, "payment_already_exists"),
            AppError::GatewayTimeout => (StatusCode::SERVICE_UNAVAILABLE, "gateway_timeout"),
            AppError::Store(_) | AppError::Configuration(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Internal failures are logged and answered with a generic message so
/// storage or configuration details never reach the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_map_to_bad_request() {
        assert_eq!(
            AppError::IdempotencyKeyReused.status_and_code().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::PaymentAlreadyExists.status_and_code().0,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn signature_failure_is_forbidden() {
        assert_eq!(
            AppError::InvalidSignature.status_and_code(),
            (StatusCode::FORBIDDEN, "invalid_signature")
        );
    }

    #[test]
    fn missing_secret_is_internal() {
        let err: AppError = SignatureError::MissingSecret.into();
        assert_eq!(err.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn gateway_errors_map_to_taxonomy() {
        let timeout: AppError =
            GatewayError::Timeout(crate::models::payment::PaymentProvider::Mock).into();
        assert_eq!(timeout.status_and_code().0, StatusCode::SERVICE_UNAVAILABLE);

        let payload: AppError = GatewayError::InvalidPayload("missing".to_string()).into();
        assert_eq!(payload.status_and_code().0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let response = AppError::Configuration("secret=abc".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let body: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert!(!text.contains("secret=abc"));
        assert_eq!(body["error"]["code"], "internal_error");
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }
}
