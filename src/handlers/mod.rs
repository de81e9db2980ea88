//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Extracts request data (path, headers, body)
//! 2. Delegates to `PaymentService`
//! 3. Maps the outcome to a status code and JSON body

/// Service health probe
pub mod health;
/// Payment initiation and lookup endpoints
pub mod payments;
/// Provider webhook receiver
pub mod webhooks;
