//! Data models representing database entities.
//!
//! This module contains the payment, event and order structures that map to
//! database tables, plus the request and response bodies built from them.

/// Order slice and caller identity
pub mod order;
/// Payment row, status machine and provider set
pub mod payment;
/// Webhook event audit rows
pub mod payment_event;
