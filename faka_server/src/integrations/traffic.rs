//! Provisioned products are fulfilled by minting a sub-user with the upstream traffic provider. This module adapts the
//! traffic API client to the engine's [`AccountProvisioner`] contract.
use faka_engine::{
    db_types::OrderNo,
    traits::{AccountProvisioner, ProvisionedCredentials, ProvisioningError},
};
use log::*;
use traffic_tools::{random_password, sub_user_name, TrafficApi, TrafficApiError, TrafficConfig};

#[derive(Clone)]
pub struct TrafficProvisioner {
    api: TrafficApi,
}

impl TrafficProvisioner {
    pub fn new(config: TrafficConfig) -> Result<Self, TrafficApiError> {
        let api = TrafficApi::new(config)?;
        Ok(Self { api })
    }

    pub fn api(&self) -> &TrafficApi {
        &self.api
    }
}

fn to_provisioning_error(e: TrafficApiError) -> ProvisioningError {
    match e {
        TrafficApiError::NotConfigured => ProvisioningError::NotConfigured,
        TrafficApiError::Rejected { code, message } => ProvisioningError::Rejected(format!("{code}: {message}")),
        e => ProvisioningError::Unavailable(e.to_string()),
    }
}

impl AccountProvisioner for TrafficProvisioner {
    async fn provision(&self, order_no: &OrderNo) -> Result<ProvisionedCredentials, ProvisioningError> {
        let config = self.api.config();
        let username = sub_user_name(order_no.as_str());
        let password = random_password();
        let title = format!("Order {order_no}");
        self.api.add_sub_user(&username, &password, &title).await.map_err(|e| {
            warn!("🌐️ Could not provision an account for order [{order_no}]. {e}");
            to_provisioning_error(e)
        })?;
        Ok(ProvisionedCredentials {
            username,
            password,
            host: config.proxy_host.clone(),
            port: config.proxy_port,
        })
    }

    async fn deprovision(&self, username: &str) -> Result<bool, ProvisioningError> {
        self.api.delete_sub_user(username).await.map_err(to_provisioning_error)
    }
}
