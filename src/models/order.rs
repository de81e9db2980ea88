//! Order and caller identity models.
//!
//! Orders belong to the order subsystem; payments only read them.
//! The caller identity is produced by the authentication middleware.

use serde::{Deserialize, Serialize};

/// The slice of an order the payment flow needs.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Order {
    pub id: i64,

    /// Order total in minor units
    pub amount: i64,

    /// Owning customer; `None` for guest checkouts
    pub user_id: Option<i64>,
}

/// Role carried in the caller's token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    #[serde(other)]
    User,
}

/// Authenticated caller attached to the request by the auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub id: i64,
    pub role: Role,
}

impl CallerIdentity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
