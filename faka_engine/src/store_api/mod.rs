//! # Faka store public API
//!
//! The `store_api` module exposes the programmatic API of the store engine. As with the backend traits, it is split by
//! concern, so that clients can pick the parts they need:
//!
//! * [`order_flow_api`] is the primary API. It owns the order lifecycle: checkout, payment notifications, manual
//!   fulfilment, the stale-order sweep and the teardown of expired provisioned accounts.
//! * [`coupon_api`] validates, creates and generates coupons.
//! * [`inventory_api`] manages products, categories and the license pool.
//! * [`settings_api`] reads and writes runtime settings, and resolves the payment gateway configuration from them.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits the API needs.
//!
//! ```rust,ignore
//! use faka_engine::{events::EventProducers, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = OrderFlowApi::new(db, provisioner, EventProducers::default());
//! let expired = api.expire_stale_orders().await?;
//! ```
pub mod coupon_api;
pub mod errors;
pub mod inventory_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod settings_api;
