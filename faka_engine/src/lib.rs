//! Faka store engine
//!
//! The engine is the core of the Faka digital goods store. It turns checkouts and asynchronous, possibly repeated,
//! possibly late payment notifications into exactly-once delivery of scarce inventory: pre-loaded license codes, or
//! accounts minted on demand with an upstream provider.
//!
//! The library is divided into these sections:
//! 1. Storage ([`mod@traits`] and [`SqliteDatabase`]). The traits describe what a backend must do; every operation
//!    that spans more than one entity (an order and its coupon, an order and its inventory) is a single atomic call.
//!    SQLite is the supported backend.
//! 2. Pure rules ([`mod@helpers`]): payment gateway signatures, coupon checks and pricing.
//! 3. The public API ([`OrderFlowApi`], [`CouponApi`], [`InventoryApi`], [`SettingsApi`]). The HTTP server only ever
//!    talks to these.
//!
//! The engine also emits events ([`mod@events`]) after an order is paid or expired. Subscribers, such as the
//! notification mailer, run on their own tasks and can never hold up or roll back a payment.
pub mod db_types;
pub mod events;
pub mod helpers;
mod sqlite;
mod store_api;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use sqlite::SqliteDatabase;
pub use store_api::{
    coupon_api::CouponApi,
    errors::OrderFlowError,
    inventory_api::{InventoryApi, LICENSE_LIST_LIMIT},
    order_flow_api::{
        OrderFlowApi,
        DEFAULT_PAYMENT_WINDOW_MINUTES,
        GATEWAY_PAYMENT_METHOD,
        LOOKUP_LIMIT,
        MANUAL_PAYMENT_METHOD,
    },
    order_objects,
    settings_api::{self, SettingsApi},
};
