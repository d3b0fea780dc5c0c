use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::{
    db_types::{License, NewOrder, Order, OrderNo, Product, TrafficAccount},
    helpers::CouponError,
    traits::{FulfilmentResult, ProvisionedCredentials},
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorefrontError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(i64),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderNo),
    #[error("Insufficient stock for product {product_id}. Requested {requested}, but only {available} available")]
    InsufficientStock { product_id: i64, requested: i64, available: i64 },
    #[error("{0}")]
    CouponError(#[from] CouponError),
    #[error("Coupon {0} already exists")]
    CouponAlreadyExists(String),
    #[error("Invalid input. {0}")]
    InvalidInput(String),
    #[error("Order {0} is for a provisioned product, but no account was provisioned")]
    ProvisioningRequired(OrderNo),
    #[error("The order changed underneath us. {0}")]
    StateConflict(String),
}

impl From<sqlx::Error> for StorefrontError {
    fn from(e: sqlx::Error) -> Self {
        StorefrontError::DatabaseError(e.to_string())
    }
}

/// This trait defines the highest level of behaviour for backends supporting the Faka order flow.
///
/// The two cross-entity invariants of the store are enforced here, each inside a single database transaction:
/// * an order is created together with the consumption of its coupon, and
/// * an order moves from `Pending` to `Paid` together with the allocation of its inventory.
#[allow(async_fn_in_trait)]
pub trait StorefrontDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, StorefrontError>;

    /// Creates a `Pending` order, in a single atomic transaction:
    /// * checks that the product exists and, for standard products, that at least `quantity` units are available,
    /// * if a coupon code is given, validates it against the product and marks it used by this order,
    /// * computes `total = max(0, price * quantity - discount)` and stores the order.
    ///
    /// Stock is checked, not reserved. Allocation only happens on payment.
    async fn create_order(&self, order: NewOrder) -> Result<Order, StorefrontError>;

    async fn fetch_order(&self, order_no: &OrderNo) -> Result<Option<Order>, StorefrontError>;

    /// The most recent orders (newest first) placed with the given buyer contact.
    async fn fetch_orders_for_contact(&self, contact: &str, limit: i64) -> Result<Vec<Order>, StorefrontError>;

    /// Presents a payment for the order. In a single atomic transaction:
    /// * an already `Paid` order is returned untouched,
    /// * an order that is already `Expired`, or whose age at `now` exceeds `payment_window`, ends up `Expired` with
    ///   nothing allocated,
    /// * otherwise inventory is allocated (the oldest `quantity` available units, or a single unit describing the
    ///   `provisioned` account) and the order moves to `Paid` with `paid_at = now`.
    ///
    /// If allocation fails, the transaction is rolled back and the order keeps its status.
    async fn fulfil_order(
        &self,
        order_no: &OrderNo,
        payment_method: &str,
        payment_window: Duration,
        now: DateTime<Utc>,
        provisioned: Option<ProvisionedCredentials>,
    ) -> Result<FulfilmentResult, StorefrontError>;

    /// Moves every `Pending` order created before `cutoff` to `Expired`. Returns the orders that were changed.
    async fn expire_stale_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StorefrontError>;

    /// The units allocated to an order.
    async fn fetch_licenses_for_order(&self, order_id: i64) -> Result<Vec<License>, StorefrontError>;

    /// Sets the fulfilment-email flag. Returns `false` if it was already set.
    async fn mark_email_sent(&self, order_no: &OrderNo) -> Result<bool, StorefrontError>;

    async fn fetch_traffic_account(&self, username: &str) -> Result<Option<TrafficAccount>, StorefrontError>;

    /// Provisioned accounts whose expiry is before `now`.
    async fn fetch_expired_traffic_accounts(&self, now: DateTime<Utc>) -> Result<Vec<TrafficAccount>, StorefrontError>;

    async fn delete_traffic_account(&self, id: i64) -> Result<(), StorefrontError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), StorefrontError> {
        Ok(())
    }
}
