use faka_common::{parse_number, Secret};
use log::*;

pub const DEFAULT_TRAFFIC_API_URL: &str = "https://api.cliproxy.com/traffic";

#[derive(Debug, Clone, Default)]
pub struct TrafficConfig {
    /// Base URL of the sub-user API, without a trailing slash.
    pub api_url: String,
    pub api_key: Secret<String>,
    /// The gateway host that provisioned sub-users connect through. Used to build connection descriptors.
    pub proxy_host: String,
    pub proxy_port: u16,
    /// Traffic allowance granted to each new sub-user, in GB.
    pub allowance_gb: u32,
}

impl TrafficConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("FAKA_TRAFFIC_API_URL").unwrap_or_else(|_| {
            info!("🌐️ FAKA_TRAFFIC_API_URL not set, using {DEFAULT_TRAFFIC_API_URL}");
            DEFAULT_TRAFFIC_API_URL.to_string()
        });
        let api_key = Secret::new(std::env::var("FAKA_TRAFFIC_API_KEY").unwrap_or_else(|_| {
            warn!("🌐️ FAKA_TRAFFIC_API_KEY not set. Provisioned products cannot be fulfilled until it is configured.");
            String::default()
        }));
        let proxy_host = std::env::var("FAKA_TRAFFIC_PROXY_HOST").unwrap_or_else(|_| {
            warn!("🌐️ FAKA_TRAFFIC_PROXY_HOST not set, using (probably useless) default");
            "proxy.example.com".to_string()
        });
        let proxy_port = parse_number::<u16>(std::env::var("FAKA_TRAFFIC_PROXY_PORT").ok()).unwrap_or_else(|| {
            info!("🌐️ FAKA_TRAFFIC_PROXY_PORT not set or invalid, using 8000");
            8000
        });
        let allowance_gb = parse_number::<u32>(std::env::var("FAKA_TRAFFIC_ALLOWANCE_GB").ok()).unwrap_or(1);
        Self { api_url: api_url.trim_end_matches('/').to_string(), api_key, proxy_host, proxy_port, allowance_gb }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}
