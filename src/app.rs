//! Router assembly and shared handler state.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    handlers,
    middleware::{self, auth::TokenVerifier},
    services::payment_service::PaymentService,
};

/// Largest accepted webhook body.
pub const WEBHOOK_BODY_LIMIT: usize = 1024 * 1024;

/// State shared with every handler via `State` extraction.
#[derive(Clone)]
pub struct AppState {
    pub payments: PaymentService,
    pub tokens: TokenVerifier,
    pub webhook_secret: String,
}

/// Build the HTTP router.
///
/// # Routes
///
/// Authenticated (Bearer token):
/// - `POST /payment/order/{order_id}/initiate`
/// - `GET /payment/order/{order_id}`
/// - `GET /payment/events`
/// - `GET /payment/{payment_id}`
///
/// Public:
/// - `POST /payment/webhook/{provider}` (signature-verified)
/// - `GET /health`
pub fn build_router(state: AppState) -> Router {
    let authenticated_routes = Router::new()
        .route(
            "/payment/order/{order_id}/initiate",
            post(handlers::payments::initiate_payment),
        )
        .route(
            "/payment/order/{order_id}",
            get(handlers::payments::get_order_payment),
        )
        .route("/payment/events", get(handlers::payments::list_events))
        .route("/payment/{payment_id}", get(handlers::payments::get_payment))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    let webhook_routes = Router::new()
        .route(
            "/payment/webhook/{provider}",
            post(handlers::webhooks::receive_webhook),
        )
        .layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(webhook_routes)
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
