//! Application configuration loaded from environment variables.

use std::time::Duration;

use alloy::primitives::Address;
use serde::Deserialize;
use url::Url;

use crate::chain::ConfirmationPolicy;

/// Default market factory deployment.
pub const DEFAULT_FACTORY_ADDRESS: &str = "0x10a729326df51763e2276c28b6d889e8ac8da14a";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Persistence Store ===
    /// Base URL of the market store, including the `/api` prefix.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    // === Reconciler Timers ===
    /// Seconds between backend feed polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Seconds between category refreshes.
    #[serde(default = "default_recategorize_interval")]
    pub recategorize_interval_secs: u64,

    /// Cap on in-flight on-chain resolution checks.
    #[serde(default = "default_max_checks")]
    pub max_concurrent_resolution_checks: usize,

    // === Transactions ===
    /// Give up waiting for a receipt after this many seconds.
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,

    /// Milliseconds between receipt reads while confirming.
    #[serde(default = "default_confirmation_poll")]
    pub confirmation_poll_interval_ms: u64,

    // === Wallet ===
    /// Wallet private key (hex, starts with 0x). Presence means connected.
    #[serde(default)]
    pub wallet_private_key: Option<String>,

    /// Market factory contract.
    #[serde(default = "default_factory_address")]
    pub factory_address: String,

    // === Match Feed ===
    /// Sports data API base URL.
    #[serde(default = "default_sports_api_url")]
    pub sports_api_url: String,

    /// Load the seed fixtures at start.
    #[serde(default = "default_true")]
    pub seed_markets: bool,

    // === Server Configuration ===
    /// HTTP server port for the status API.
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP server port for the persistence shim.
    #[serde(default = "default_store_port")]
    pub store_port: u16,

    /// SQLite database file of the persistence shim.
    #[serde(default = "default_store_db_path")]
    pub store_db_path: String,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,

    /// Emit logs as JSON.
    #[serde(default)]
    pub json_logs: bool,
}

fn default_backend_url() -> String {
    "http://localhost:4000/api".to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_recategorize_interval() -> u64 {
    15
}

fn default_max_checks() -> usize {
    8
}

fn default_confirmation_timeout() -> u64 {
    600
}

fn default_confirmation_poll() -> u64 {
    2000
}

fn default_factory_address() -> String {
    DEFAULT_FACTORY_ADDRESS.to_string()
}

fn default_sports_api_url() -> String {
    "https://www.thesportsdb.com/api/v1/json/3".to_string()
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    8080
}

fn default_store_port() -> u16 {
    4000
}

fn default_store_db_path() -> String {
    "data.sqlite".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            poll_interval_secs: default_poll_interval(),
            recategorize_interval_secs: default_recategorize_interval(),
            max_concurrent_resolution_checks: default_max_checks(),
            confirmation_timeout_secs: default_confirmation_timeout(),
            confirmation_poll_interval_ms: default_confirmation_poll(),
            wallet_private_key: None,
            factory_address: default_factory_address(),
            sports_api_url: default_sports_api_url(),
            seed_markets: true,
            port: default_port(),
            store_port: default_store_port(),
            store_db_path: default_store_db_path(),
            rust_log: default_log_level(),
            verbose: false,
            json_logs: false,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_secs == 0 {
            return Err("POLL_INTERVAL_SECS must be positive".to_string());
        }
        if self.recategorize_interval_secs == 0 {
            return Err("RECATEGORIZE_INTERVAL_SECS must be positive".to_string());
        }
        if self.confirmation_timeout_secs == 0 || self.confirmation_poll_interval_ms == 0 {
            return Err("confirmation timeout and poll interval must be positive".to_string());
        }
        if self.max_concurrent_resolution_checks == 0 {
            return Err("MAX_CONCURRENT_RESOLUTION_CHECKS must be at least 1".to_string());
        }

        if let Some(key) = &self.wallet_private_key {
            let Some(hex_part) = key.strip_prefix("0x") else {
                return Err("WALLET_PRIVATE_KEY must start with 0x".to_string());
            };
            if hex_part.len() != 64 || !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err("WALLET_PRIVATE_KEY must be 32 bytes of hex".to_string());
            }
        }

        if self.store_db_path.trim().is_empty() {
            return Err("STORE_DB_PATH must not be empty".to_string());
        }

        self.factory()?;

        for (name, value) in [
            ("BACKEND_URL", &self.backend_url),
            ("SPORTS_API_URL", &self.sports_api_url),
        ] {
            Url::parse(value).map_err(|e| format!("{name} is not a valid URL: {e}"))?;
        }

        Ok(())
    }

    /// Parsed factory address.
    pub fn factory(&self) -> Result<Address, String> {
        self.factory_address
            .parse()
            .map_err(|e| format!("FACTORY_ADDRESS is not a valid address: {e}"))
    }

    /// Whether a wallet key is configured.
    pub fn wallet_connected(&self) -> bool {
        self.wallet_private_key.is_some()
    }

    /// Transaction confirmation bounds.
    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy::from_config(
            self.confirmation_timeout_secs,
            self.confirmation_poll_interval_ms,
        )
    }

    /// Backend poll period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
