//! HTTP middleware components.
//!
//! Middleware run before route handlers. Here they authenticate the caller
//! and short-circuit requests that carry no valid identity.

/// Bearer token authentication middleware
pub mod auth;
