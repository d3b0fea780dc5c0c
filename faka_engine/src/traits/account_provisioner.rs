use thiserror::Error;

use crate::{db_types::OrderNo, traits::ProvisionedCredentials};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvisioningError {
    #[error("Account provisioning is not configured")]
    NotConfigured,
    #[error("The upstream provider rejected the request: {0}")]
    Rejected(String),
    #[error("Could not reach the upstream provider: {0}")]
    Unavailable(String),
}

/// Creates and removes accounts with the upstream provider for provisioned products.
///
/// Calls to the provisioner are slow network I/O, so the order flow never makes them while a database transaction is
/// open.
#[allow(async_fn_in_trait)]
pub trait AccountProvisioner {
    /// Mints a new account for the given order.
    async fn provision(&self, order_no: &OrderNo) -> Result<ProvisionedCredentials, ProvisioningError>;

    /// Removes the account upstream. Returns `true` only when the provider confirmed the removal.
    async fn deprovision(&self, username: &str) -> Result<bool, ProvisioningError>;
}
