//! API configuration
//!
//! Loaded from `API_*` environment variables (after `.env`, if present).
//! Every field has a default so a bare `cargo run` works against a local
//! database.

use serde::Deserialize;

use core_kernel::Timezone;

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Maximum pooled connections
    pub max_connections: u32,
    /// Log level, used when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON log lines
    pub log_json: bool,
    /// SMS gateway endpoint
    pub sms_endpoint: String,
    /// SMS gateway bearer token; SMS is disabled without one
    pub sms_token: Option<String>,
    /// Sender name shown on outbound texts
    pub sms_sender: String,
    /// Local hour at which the overdue sweep runs
    pub sweep_hour: u32,
    /// IANA timezone for the sweep and for "today"
    pub timezone: Timezone,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/water_billing".to_string(),
            max_connections: 10,
            log_level: "info".to_string(),
            log_json: false,
            sms_endpoint: "https://rest.moceanapi.com/rest/2/sms".to_string(),
            sms_token: None,
            sms_sender: "Billink".to_string(),
            sweep_hour: 2,
            timezone: Timezone::default(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn sms_enabled(&self) -> bool {
        self.sms_token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty())
    }
}
