//! #  Storefront backend contracts.
//!
//! This module defines the behaviour that a database backend must expose in order to drive the Faka order flow,
//! as well as the contract for the upstream account provisioner used by provisioned products.
//!
//! ## Traits
//!
//! * [`StorefrontDatabase`] is the highest level of behaviour: order creation with coupon consumption, the
//!   atomic pending-to-paid transition with inventory allocation, expiry, and the provisioned account ledger.
//! * [`InventoryManagement`] covers products, categories and the license pool.
//! * [`CouponManagement`] covers coupon storage. The coupon *rules* live in [`crate::helpers`].
//! * [`SettingsManagement`] is the runtime key/value settings store.
//! * [`AccountProvisioner`] mints and removes upstream accounts. It is not a database trait, but it is consumed by the
//!   same order flow.
mod account_provisioner;
mod coupon_management;
mod data_objects;
mod inventory_management;
mod settings_management;
mod storefront_database;

pub use account_provisioner::{AccountProvisioner, ProvisioningError};
pub use coupon_management::CouponManagement;
pub use data_objects::{FulfilmentResult, ProvisionedCredentials};
pub use inventory_management::InventoryManagement;
pub use settings_management::SettingsManagement;
pub use storefront_database::{StorefrontDatabase, StorefrontError};
