//! Payment use cases exposed to the HTTP layer.
//!
//! Each operation resolves the order, applies the access guard where the
//! caller matters, and delegates to the ledger or gateway. No state is held
//! here beyond the shared storage handles.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        order::{CallerIdentity, Order},
        payment::{InitiatePaymentRequest, Payment, PaymentProvider},
        payment_event::{EventFilter, EventListQuery, PaymentEvent},
    },
    services::{
        access,
        gateway::{self, ProviderGateway},
        payment_ledger::{self, InitiateOutcome, NewPaymentRequest, WebhookOutcome},
        validation,
    },
    store::{OrderReader, PaymentStore},
};

/// Maximum rows returned by the event audit listing.
pub const EVENT_LIST_LIMIT: i64 = 200;

/// A payment together with its recorded webhook events.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "550e8400-...",
///   "orderId": 10,
///   "status": "SUCCEEDED",
///   "events": [{ "providerEventId": "evt-1", "eventType": "payment.succeeded" }]
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct PaymentDetails {
    #[serde(flatten)]
    pub payment: Payment,
    pub events: Vec<PaymentEvent>,
}

#[derive(Clone)]
pub struct PaymentService {
    payments: Arc<dyn PaymentStore>,
    orders: Arc<dyn OrderReader>,
    gateway: ProviderGateway,
    default_currency: String,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        orders: Arc<dyn OrderReader>,
        gateway: ProviderGateway,
        default_currency: impl Into<String>,
    ) -> Self {
        Self {
            payments,
            orders,
            gateway,
            default_currency: default_currency.into(),
        }
    }

    async fn load_order(&self, order_id: i64) -> Result<Order, AppError> {
        self.orders
            .find_order(order_id)
            .await?
            .ok_or(AppError::OrderNotFound)
    }

    fn guard(order: &Order, caller: &CallerIdentity) -> Result<(), AppError> {
        if access::can_access_order(order, caller) {
            Ok(())
        } else {
            tracing::warn!(order_id = order.id, caller_id = caller.id, "order access denied");
            Err(AppError::Forbidden(
                "You do not have access to this order".to_string(),
            ))
        }
    }

    async fn with_events(&self, payment: Payment) -> Result<PaymentDetails, AppError> {
        let events = self.payments.events_for_payment(payment.id).await?;
        Ok(PaymentDetails { payment, events })
    }

    /// Payment for an order, with its events.
    ///
    /// # Errors
    ///
    /// - `OrderNotFound`: no such order
    /// - `Forbidden`: caller is neither owner nor admin
    /// - `PaymentNotFound`: the order has no payment yet
    pub async fn get_by_order(
        &self,
        order_id: i64,
        caller: &CallerIdentity,
    ) -> Result<PaymentDetails, AppError> {
        let order = self.load_order(order_id).await?;
        Self::guard(&order, caller)?;

        let payment = self
            .payments
            .find_by_order(order_id)
            .await?
            .ok_or(AppError::PaymentNotFound)?;

        self.with_events(payment).await
    }

    /// Payment by id, guarded by its owning order.
    ///
    /// A payment whose order no longer exists is visible to administrators only.
    pub async fn get_by_id(
        &self,
        payment_id: Uuid,
        caller: &CallerIdentity,
    ) -> Result<PaymentDetails, AppError> {
        let payment = self
            .payments
            .find_by_id(payment_id)
            .await?
            .ok_or(AppError::PaymentNotFound)?;

        match self.orders.find_order(payment.order_id).await? {
            Some(order) => Self::guard(&order, caller)?,
            None if caller.is_admin() => {}
            None => return Err(AppError::PaymentNotFound),
        }

        self.with_events(payment).await
    }

    /// Start a payment for an order.
    ///
    /// # Process
    ///
    /// Checks run in this order, failing on the first problem: order exists,
    /// caller may access it, provider is supported, idempotency key is present,
    /// currency, return URL, metadata. The ledger then creates or replays the
    /// payment.
    pub async fn initiate(
        &self,
        order_id: i64,
        caller: &CallerIdentity,
        idempotency_key: Option<String>,
        request: InitiatePaymentRequest,
    ) -> Result<InitiateOutcome, AppError> {
        let order = self.load_order(order_id).await?;
        Self::guard(&order, caller)?;

        let provider = gateway::normalize_provider(request.provider.as_deref())?;
        let idempotency_key = validation::normalize_idempotency_key(idempotency_key.as_deref())?;
        let currency =
            validation::normalize_currency(request.currency.as_deref(), &self.default_currency)?;
        let return_url = validation::normalize_return_url(request.return_url.as_deref())?;
        let metadata = validation::normalize_metadata(request.metadata)?;

        payment_ledger::initiate(
            self.payments.as_ref(),
            &self.gateway,
            NewPaymentRequest {
                order,
                provider,
                idempotency_key: Some(idempotency_key),
                currency,
                return_url,
                metadata,
            },
        )
        .await
    }

    /// Handle an already signature-verified webhook body.
    ///
    /// # Errors
    ///
    /// - `UnsupportedProvider`: unknown provider path segment
    /// - `InvalidRequest`: empty body or invalid JSON
    /// - `InvalidPayload`: JSON lacks the event or payment identifier
    pub async fn process_webhook_event(
        &self,
        provider: &str,
        raw_body: &[u8],
    ) -> Result<WebhookOutcome, AppError> {
        let provider = gateway::normalize_provider(Some(provider))?;

        if raw_body.iter().all(u8::is_ascii_whitespace) {
            return Err(AppError::InvalidRequest("Webhook body is empty".to_string()));
        }

        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|err| AppError::InvalidRequest(format!("Invalid webhook JSON: {err}")))?;

        payment_ledger::process_webhook_event(self.payments.as_ref(), &self.gateway, provider, payload)
            .await
    }

    /// Newest-first webhook audit listing. Administrators only.
    pub async fn list_events(
        &self,
        caller: &CallerIdentity,
        query: EventListQuery,
    ) -> Result<Vec<PaymentEvent>, AppError> {
        if !caller.is_admin() {
            return Err(AppError::Forbidden(
                "Administrator role required".to_string(),
            ));
        }

        let provider = match query.provider.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<PaymentProvider>()
                    .map_err(|err| AppError::UnsupportedProvider(err.to_string()))?,
            ),
        };

        let filter = EventFilter {
            provider,
            payment_id: query.payment_id,
            provider_event_id: query
                .provider_event_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
        };

        Ok(self.payments.list_events(&filter, EVENT_LIST_LIMIT).await?)
    }

    /// Storage connectivity probe.
    pub async fn ping(&self) -> Result<(), AppError> {
        Ok(self.payments.ping().await?)
    }
}
