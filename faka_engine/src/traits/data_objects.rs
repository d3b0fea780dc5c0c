use serde::Serialize;

use crate::db_types::{License, Order};

/// Credentials for an account that has been created upstream for a provisioned product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedCredentials {
    pub username: String,
    pub password: String,
    /// The host and port that the account connects through.
    pub host: String,
    pub port: u16,
}

impl ProvisionedCredentials {
    /// The `host:port:user:pass` connection descriptor that is stored as the order's single license code.
    pub fn descriptor(&self) -> String {
        format!("{}:{}:{}:{}", self.host, self.port, self.username, self.password)
    }
}

/// The result of presenting a payment for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum FulfilmentResult {
    /// The order moved to `Paid` and these units were allocated to it.
    Paid { order: Order, licenses: Vec<License> },
    /// The order was already paid. Nothing changed.
    AlreadyPaid { order: Order },
    /// The payment arrived after the payment window closed. The order is `Expired` and nothing was allocated.
    /// `newly_expired` is false if the order had already been expired by the sweeper.
    Expired { order: Order, newly_expired: bool },
}

impl FulfilmentResult {
    pub fn order(&self) -> &Order {
        match self {
            FulfilmentResult::Paid { order, .. } => order,
            FulfilmentResult::AlreadyPaid { order } => order,
            FulfilmentResult::Expired { order, .. } => order,
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, FulfilmentResult::Paid { .. })
    }
}
