//! Service configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional file,
//! then `LIPA_`-prefixed environment variables using `__` between sections
//! (e.g. `LIPA_GATEWAY__PASSKEY`).

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub rating: RatingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,

    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 7070)),
            enable_cors: true,
        }
    }
}

/// Daraja credentials and the fixed values every push carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    /// Publicly reachable URL the gateway posts results to.
    pub callback_url: String,
    pub transaction_type: String,
    pub account_reference_prefix: String,
    pub timeout_secs: u64,
    /// Prepended to national-format payer numbers.
    pub country_code: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sandbox.safaricom.co.ke".to_string(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            shortcode: String::new(),
            passkey: String::new(),
            callback_url: "http://localhost:7070/api/mpesa/stkcallback".to_string(),
            transaction_type: "CustomerPayBillOnline".to_string(),
            account_reference_prefix: "Matatu".to_string(),
            timeout_secs: 30,
            country_code: "254".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// RocksDB directory. In-memory storage is used when unset.
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingConfig {
    /// Rolling window in which a payer may rate a subject only once.
    pub window_hours: i64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self { window_hours: 24 }
    }
}

/// Longest rating window accepted, one leap year.
const MAX_WINDOW_HOURS: i64 = 24 * 366;

impl RatingConfig {
    /// The window as a duration; zero, negative or oversized values are
    /// rejected.
    pub fn window(&self) -> Result<chrono::Duration, config::ConfigError> {
        let invalid = || {
            config::ConfigError::Message(format!(
                "rating.window_hours must be between 1 and {}, got {}",
                MAX_WINDOW_HOURS, self.window_hours
            ))
        };
        if !(1..=MAX_WINDOW_HOURS).contains(&self.window_hours) {
            return Err(invalid());
        }
        chrono::Duration::try_hours(self.window_hours).ok_or_else(invalid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from defaults, an optional file and the environment.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LIPA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.rating.window()?;
        Ok(config)
    }
}
