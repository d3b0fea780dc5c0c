use std::{collections::HashMap, fmt::Debug};

use faka_common::Secret;
use log::*;

use crate::{
    db_types::Setting,
    helpers::{GatewayConfig, SignScheme},
    traits::{SettingsManagement, StorefrontError},
};

pub const EPAY_API_URL: &str = "epay_api_url";
pub const EPAY_PID: &str = "epay_pid";
pub const EPAY_KEY: &str = "epay_key";
pub const EPAY_SIGN_TYPE: &str = "epay_sign_type";
pub const EPAY_PUBLIC_KEY: &str = "epay_public_key";
pub const EPAY_PRIVATE_KEY: &str = "epay_private_key";
pub const SITE_NAME: &str = "site_name";
/// Never returned by [`SettingsApi::settings`].
pub const ADMIN_PASSWORD: &str = "admin_password";

/// Runtime settings. Gateway credentials stored here override the ones the server was started with, without a
/// restart.
pub struct SettingsApi<B> {
    db: B,
}

impl<B: Debug> Debug for SettingsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettingsApi ({:?})", self.db)
    }
}

impl<B> SettingsApi<B>
where B: SettingsManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// All settings, minus the ones that must never leave the server.
    pub async fn settings(&self) -> Result<Vec<Setting>, StorefrontError> {
        let settings = self.db.fetch_settings().await?;
        Ok(settings.into_iter().filter(|s| s.key != ADMIN_PASSWORD).collect())
    }

    pub async fn update_settings(&self, settings: &[Setting]) -> Result<usize, StorefrontError> {
        if let Some(s) = settings.iter().find(|s| s.key.trim().is_empty()) {
            return Err(StorefrontError::InvalidInput(format!("Setting with value '{}' has no key", s.value)));
        }
        let count = self.db.upsert_settings(settings).await?;
        info!("🪛️ {count} settings updated");
        Ok(count)
    }

    /// Resolves the gateway configuration for this request: non-empty `epay_*` settings override `defaults`.
    pub async fn gateway_config(&self, defaults: &GatewayConfig) -> Result<GatewayConfig, StorefrontError> {
        let settings = self.db.fetch_settings().await?;
        Ok(merge_gateway_settings(defaults, settings))
    }
}

pub fn merge_gateway_settings(defaults: &GatewayConfig, settings: Vec<Setting>) -> GatewayConfig {
    let values = settings
        .into_iter()
        .filter(|s| !s.value.trim().is_empty())
        .map(|s| (s.key, s.value.trim().to_string()))
        .collect::<HashMap<String, String>>();
    let mut config = defaults.clone();
    if let Some(v) = values.get(EPAY_API_URL) {
        config.api_url = v.clone();
    }
    if let Some(v) = values.get(EPAY_PID) {
        config.pid = v.clone();
    }
    if let Some(v) = values.get(EPAY_KEY) {
        config.key = Secret::new(v.clone());
    }
    if let Some(v) = values.get(EPAY_SIGN_TYPE) {
        match v.parse::<SignScheme>() {
            Ok(scheme) => config.sign_scheme = scheme,
            Err(e) => warn!("🪛️ Ignoring the stored sign type. {e}. Using {}", config.sign_scheme),
        }
    }
    if let Some(v) = values.get(EPAY_PUBLIC_KEY) {
        config.public_key = v.clone();
    }
    if let Some(v) = values.get(EPAY_PRIVATE_KEY) {
        config.private_key = Secret::new(v.clone());
    }
    if let Some(v) = values.get(SITE_NAME) {
        config.site_name = v.clone();
    }
    config
}
