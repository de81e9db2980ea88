//! Business logic services.
//!
//! Services contain the payment rules separated from HTTP handlers.
//! Storage is reached only through the ports in `crate::store`.

/// Order ownership guard
pub mod access;
/// Provider checkout creation and webhook normalization
pub mod gateway;
/// Idempotent payment creation and webhook dedup
pub mod payment_ledger;
pub mod payment_service;
/// HMAC-SHA256 webhook signatures
pub mod signature;
pub mod validation;
