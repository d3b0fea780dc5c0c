use serde::Serialize;

use crate::db_types::{License, Order, Product};

/// Published once, when an order moves from `Pending` to `Paid` and its goods have been allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub product: Product,
    pub licenses: Vec<License>,
}

impl OrderPaidEvent {
    pub fn new(order: Order, product: Product, licenses: Vec<License>) -> Self {
        Self { order, product, licenses }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpiryReason {
    /// The sweeper found the order past its payment window.
    Timeout,
    /// A payment notification arrived after the payment window had closed.
    LatePayment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderExpiredEvent {
    pub order: Order,
    pub reason: ExpiryReason,
}

impl OrderExpiredEvent {
    pub fn new(order: Order, reason: ExpiryReason) -> Self {
        Self { order, reason }
    }
}
