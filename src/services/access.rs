//! Order access guard.
//!
//! A caller may view or pay for an order when they are an administrator or
//! when they own it. Guest orders (no owner) are visible to administrators only.

use crate::models::order::{CallerIdentity, Order};

pub fn can_access_order(order: &Order, caller: &CallerIdentity) -> bool {
    if caller.is_admin() {
        return true;
    }
    order.user_id == Some(caller.id)
}
