//! Operator settings persisted to disk.
//!
//! Stored in `~/.tradegate/settings.toml`. Values are resolved with
//! env var > settings.toml > default priority by `crate::config`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings file contents. Every section is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Account-link challenge policy.
    #[serde(default)]
    pub link: LinkSettings,

    /// Per-identity spend and order-size limits.
    #[serde(default)]
    pub trade_limits: TradeLimitsSettings,

    /// Store backend selection.
    #[serde(default)]
    pub database: DatabaseSettings,

    /// Static market table served by the in-process market directory.
    #[serde(default)]
    pub markets: Vec<MarketSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkSettings {
    #[serde(default = "default_challenge_ttl_secs")]
    pub challenge_ttl_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Application label embedded in every challenge message.
    #[serde(default = "default_message_domain")]
    pub message_domain: String,
}

fn default_challenge_ttl_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_message_domain() -> String {
    "tradegate".to_string()
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            challenge_ttl_secs: default_challenge_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            message_domain: default_message_domain(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeLimitsSettings {
    #[serde(default = "default_min_order_cents")]
    pub min_order_cents: i64,

    #[serde(default = "default_max_order_cents")]
    pub max_order_cents: i64,

    #[serde(default = "default_daily_limit_cents")]
    pub daily_limit_cents: i64,

    #[serde(default = "default_hourly_limit_cents")]
    pub hourly_limit_cents: i64,

    #[serde(default = "default_idempotency_bucket_secs")]
    pub idempotency_bucket_secs: u64,
}

fn default_min_order_cents() -> i64 {
    100
}

fn default_max_order_cents() -> i64 {
    500
}

fn default_daily_limit_cents() -> i64 {
    500
}

fn default_hourly_limit_cents() -> i64 {
    500
}

fn default_idempotency_bucket_secs() -> u64 {
    300
}

impl Default for TradeLimitsSettings {
    fn default() -> Self {
        Self {
            min_order_cents: default_min_order_cents(),
            max_order_cents: default_max_order_cents(),
            daily_limit_cents: default_daily_limit_cents(),
            hourly_limit_cents: default_hourly_limit_cents(),
            idempotency_bucket_secs: default_idempotency_bucket_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DatabaseSettings {
    /// Store backend: "memory" or "libsql".
    #[serde(default)]
    pub backend: Option<String>,

    /// Path to local libSQL database file.
    #[serde(default)]
    pub libsql_path: Option<String>,

    /// Turso cloud URL for remote replica sync.
    #[serde(default)]
    pub libsql_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketSettings {
    pub id: String,
    #[serde(default = "default_market_status")]
    pub status: String,
}

fn default_market_status() -> String {
    "active".to_string()
}

impl Settings {
    /// Default settings path (`~/.tradegate/settings.toml`).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tradegate")
            .join("settings.toml")
    }

    /// Load settings from a TOML file; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(err) => return Err(ConfigError::Io(err)),
        };
        toml::from_str(&raw)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Load from the default path.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path())
    }
}
