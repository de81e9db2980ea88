//! Payment orchestration for the online store.
//!
//! Creates at most one payment per order under client idempotency keys,
//! hands checkout to a provider, and consumes signed provider webhooks
//! exactly once.

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
