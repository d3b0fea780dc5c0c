use std::env;

use chrono::Duration;
use faka_common::Secret;
use faka_engine::{
    helpers::{GatewayConfig, SignScheme},
    DEFAULT_PAYMENT_WINDOW_MINUTES,
};
use log::*;
use traffic_tools::TrafficConfig;

const DEFAULT_FAKA_HOST: &str = "127.0.0.1";
const DEFAULT_FAKA_PORT: u16 = 8360;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/faka_store.db";
const DEFAULT_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);
const DEFAULT_SITE_TITLE: &str = "Faka";
const DEFAULT_MAIL_API_URL: &str = "https://api.resend.com/emails";
const DEFAULT_MAIL_FROM: &str = "onboarding@resend.dev";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The externally reachable base URL of the store. The gateway posts notifications to, and returns buyers to,
    /// addresses under this URL.
    pub public_url: String,
    /// Requests to `/admin` must carry this key in the `X-API-KEY` header. If it is empty, all admin requests are
    /// refused.
    pub admin_api_key: Secret<String>,
    /// How long a pending order waits for payment before it expires.
    pub payment_window: Duration,
    /// How often the expiry worker runs.
    pub sweep_interval: std::time::Duration,
    /// The default payment gateway credentials. Values in the settings table override these at runtime.
    pub gateway: GatewayConfig,
    pub traffic: TrafficConfig,
    pub mail: MailConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FAKA_HOST.to_string(),
            port: DEFAULT_FAKA_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            public_url: format!("http://{DEFAULT_FAKA_HOST}:{DEFAULT_FAKA_PORT}"),
            admin_api_key: Secret::default(),
            payment_window: Duration::minutes(DEFAULT_PAYMENT_WINDOW_MINUTES),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            gateway: GatewayConfig { site_name: DEFAULT_SITE_TITLE.to_string(), ..Default::default() },
            traffic: TrafficConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("FAKA_HOST").ok().unwrap_or_else(|| DEFAULT_FAKA_HOST.into());
        let port = env::var("FAKA_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for FAKA_PORT. {e} Using the default, {DEFAULT_FAKA_PORT}, \
                         instead."
                    );
                    DEFAULT_FAKA_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_FAKA_PORT);
        let database_url = env::var("FAKA_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ FAKA_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.to_string()
        });
        let public_url = env::var("FAKA_PUBLIC_URL").ok().unwrap_or_else(|| {
            let url = format!("http://{host}:{port}");
            warn!(
                "🪛️ FAKA_PUBLIC_URL is not set. Payment notifications will be sent to {url}, which the gateway probably \
                 cannot reach."
            );
            url
        });
        let admin_api_key = env::var("FAKA_ADMIN_API_KEY").ok().filter(|s| !s.trim().is_empty()).unwrap_or_else(|| {
            warn!("🪛️ FAKA_ADMIN_API_KEY is not set. All admin requests will be refused.");
            String::default()
        });
        let (payment_window, sweep_interval) = configure_timeouts();
        Self {
            host,
            port,
            database_url,
            public_url: public_url.trim_end_matches('/').to_string(),
            admin_api_key: Secret::new(admin_api_key),
            payment_window,
            sweep_interval,
            gateway: gateway_config_from_env(),
            traffic: TrafficConfig::new_from_env_or_default(),
            mail: MailConfig::from_env_or_default(),
        }
    }
}

fn configure_timeouts() -> (Duration, std::time::Duration) {
    let payment_window = env::var("FAKA_PAYMENT_WINDOW")
        .map_err(|_| {
            info!(
                "🪛️ FAKA_PAYMENT_WINDOW is not set. Using the default value of {DEFAULT_PAYMENT_WINDOW_MINUTES} minutes."
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .ok()
                .filter(|m| *m > 0)
                .map(Duration::minutes)
                .ok_or_else(|| warn!("🪛️ Invalid configuration value for FAKA_PAYMENT_WINDOW: {s}"))
        })
        .ok()
        .unwrap_or(Duration::minutes(DEFAULT_PAYMENT_WINDOW_MINUTES));
    let sweep_interval = env::var("FAKA_SWEEP_INTERVAL")
        .map_err(|_| {
            info!(
                "🪛️ FAKA_SWEEP_INTERVAL is not set. Using the default value of {}s.",
                DEFAULT_SWEEP_INTERVAL.as_secs()
            )
        })
        .and_then(|s| {
            s.parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(std::time::Duration::from_secs)
                .ok_or_else(|| warn!("🪛️ Invalid configuration value for FAKA_SWEEP_INTERVAL: {s}"))
        })
        .ok()
        .unwrap_or(DEFAULT_SWEEP_INTERVAL);
    (payment_window, sweep_interval)
}

fn gateway_config_from_env() -> GatewayConfig {
    let api_url = env::var("FAKA_EPAY_API_URL").ok().unwrap_or_else(|| {
        warn!("🪛️ FAKA_EPAY_API_URL is not set. It must be configured in the settings table before checkout works.");
        String::default()
    });
    let pid = env::var("FAKA_EPAY_PID").ok().unwrap_or_default();
    let key = env::var("FAKA_EPAY_KEY").ok().unwrap_or_default();
    let sign_scheme = match env::var("FAKA_EPAY_SIGN_TYPE") {
        Ok(s) => s.parse::<SignScheme>().unwrap_or_else(|e| {
            warn!("🪛️ {e}. Using MD5 for FAKA_EPAY_SIGN_TYPE.");
            SignScheme::Md5
        }),
        Err(_) => SignScheme::Md5,
    };
    let public_key = env::var("FAKA_EPAY_PUBLIC_KEY").ok().unwrap_or_default();
    let private_key = env::var("FAKA_EPAY_PRIVATE_KEY").ok().unwrap_or_default();
    let site_name = env::var("FAKA_SITE_TITLE").ok().unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string());
    if sign_scheme == SignScheme::Rsa && public_key.is_empty() {
        warn!("🪛️ The gateway uses RSA signatures, but FAKA_EPAY_PUBLIC_KEY is not set. Notifications will be rejected.");
    }
    GatewayConfig {
        api_url,
        pid,
        key: Secret::new(key),
        sign_scheme,
        public_key,
        private_key: Secret::new(private_key),
        site_name,
    }
}

//-------------------------------------------------  MailConfig  -------------------------------------------------------
/// Settings for the fulfilment email. When no API key is configured, messages are written to the log instead of being
/// sent.
#[derive(Clone, Debug)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
    pub from: String,
    pub site_title: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_MAIL_API_URL.to_string(),
            api_key: Secret::default(),
            from: DEFAULT_MAIL_FROM.to_string(),
            site_title: DEFAULT_SITE_TITLE.to_string(),
        }
    }
}

impl MailConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let api_url = env::var("FAKA_MAIL_API_URL").ok().unwrap_or(defaults.api_url);
        let api_key = env::var("FAKA_MAIL_API_KEY").ok().unwrap_or_else(|| {
            info!("🪛️ FAKA_MAIL_API_KEY is not set. Fulfilment emails will be logged, not sent.");
            String::default()
        });
        let from = env::var("FAKA_MAIL_FROM").ok().unwrap_or(defaults.from);
        let site_title = env::var("FAKA_SITE_TITLE").ok().unwrap_or(defaults.site_title);
        Self { api_url, api_key: Secret::new(api_key), from, site_title }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that route handlers need. It carries no secrets, so it can be handed to every
/// worker freely.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub public_url: String,
    pub payment_window: Duration,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { public_url: config.public_url.clone(), payment_window: config.payment_window }
    }
}
