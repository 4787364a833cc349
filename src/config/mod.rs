//! Configuration for tradegate.
//!
//! Settings are loaded with priority: env var > settings.toml > default.
//! Env vars may come from `~/.tradegate/.env` (loaded via dotenvy early in
//! startup, see `crate::bootstrap`).

pub(crate) mod helpers;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::settings::{MarketSettings, Settings};

use self::helpers::{normalize_variant, optional_env, parse_optional_env};

/// Main configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub link: LinkConfig,
    pub trade_limits: TradeLimitsConfig,
    pub database: DatabaseConfig,
    pub markets: Vec<MarketSettings>,
}

impl Config {
    /// Resolve every section from env vars over the given settings.
    pub fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            link: LinkConfig::resolve(settings)?,
            trade_limits: TradeLimitsConfig::resolve(settings)?,
            database: DatabaseConfig::resolve(settings)?,
            markets: settings.markets.clone(),
        })
    }

    /// Load `~/.tradegate/settings.toml` and resolve against the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(&Settings::load()?)
    }
}

/// Account-link challenge policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    pub challenge_ttl_ms: i64,
    pub sweep_interval: Duration,
    pub message_domain: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            challenge_ttl_ms: 5 * 60 * 1000,
            sweep_interval: Duration::from_secs(60),
            message_domain: "tradegate".to_string(),
        }
    }
}

impl LinkConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let ttl_secs = parse_optional_env::<u64>("LINK_CHALLENGE_TTL_SECS", "a positive integer")?
            .unwrap_or(settings.link.challenge_ttl_secs);
        if ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LINK_CHALLENGE_TTL_SECS".to_string(),
                message: "must be > 0".to_string(),
            });
        }
        let challenge_ttl_ms = i64::try_from(ttl_secs)
            .ok()
            .and_then(|secs| secs.checked_mul(1000))
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "LINK_CHALLENGE_TTL_SECS".to_string(),
                message: "is too large".to_string(),
            })?;

        let sweep_secs =
            parse_optional_env::<u64>("LINK_SWEEP_INTERVAL_SECS", "a positive integer")?
                .unwrap_or(settings.link.sweep_interval_secs);
        if sweep_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LINK_SWEEP_INTERVAL_SECS".to_string(),
                message: "must be > 0".to_string(),
            });
        }

        let message_domain = optional_env("LINK_MESSAGE_DOMAIN")?
            .unwrap_or_else(|| settings.link.message_domain.clone());
        if message_domain.trim().is_empty() || message_domain.contains('\n') {
            return Err(ConfigError::InvalidValue {
                key: "LINK_MESSAGE_DOMAIN".to_string(),
                message: "must be a non-empty single line".to_string(),
            });
        }

        Ok(Self {
            challenge_ttl_ms,
            sweep_interval: Duration::from_secs(sweep_secs),
            message_domain,
        })
    }
}

/// Order-size bounds and spend windows applied by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeLimitsConfig {
    pub min_order_cents: i64,
    pub max_order_cents: i64,
    pub daily_limit_cents: i64,
    pub hourly_limit_cents: i64,
    pub idempotency_bucket_ms: i64,
}

impl Default for TradeLimitsConfig {
    fn default() -> Self {
        Self {
            min_order_cents: 100,
            max_order_cents: 500,
            daily_limit_cents: 500,
            hourly_limit_cents: 500,
            idempotency_bucket_ms: 5 * 60 * 1000,
        }
    }
}

impl TradeLimitsConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let limits = &settings.trade_limits;

        let min_order_cents = parse_optional_env("TRADE_MIN_ORDER_CENTS", "an integer")?
            .unwrap_or(limits.min_order_cents);
        let max_order_cents = parse_optional_env("TRADE_MAX_ORDER_CENTS", "an integer")?
            .unwrap_or(limits.max_order_cents);
        let daily_limit_cents = parse_optional_env("TRADE_DAILY_LIMIT_CENTS", "an integer")?
            .unwrap_or(limits.daily_limit_cents);
        let hourly_limit_cents = parse_optional_env("TRADE_HOURLY_LIMIT_CENTS", "an integer")?
            .unwrap_or(limits.hourly_limit_cents);
        let bucket_secs =
            parse_optional_env::<u64>("TRADE_IDEMPOTENCY_BUCKET_SECS", "a positive integer")?
                .unwrap_or(limits.idempotency_bucket_secs);

        if min_order_cents < 1 {
            return Err(ConfigError::InvalidValue {
                key: "TRADE_MIN_ORDER_CENTS".to_string(),
                message: "must be >= 1".to_string(),
            });
        }
        if max_order_cents < min_order_cents {
            return Err(ConfigError::InvalidValue {
                key: "TRADE_MAX_ORDER_CENTS".to_string(),
                message: format!("must be >= TRADE_MIN_ORDER_CENTS ({min_order_cents})"),
            });
        }
        for (key, value) in [
            ("TRADE_DAILY_LIMIT_CENTS", daily_limit_cents),
            ("TRADE_HOURLY_LIMIT_CENTS", hourly_limit_cents),
        ] {
            if value <= 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be > 0".to_string(),
                });
            }
        }
        let idempotency_bucket_ms = i64::try_from(bucket_secs)
            .ok()
            .and_then(|secs| secs.checked_mul(1000))
            .filter(|ms| *ms > 0)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "TRADE_IDEMPOTENCY_BUCKET_SECS".to_string(),
                message: "must be > 0 and fit in milliseconds".to_string(),
            })?;

        if hourly_limit_cents >= daily_limit_cents {
            tracing::debug!(
                hourly_limit_cents,
                daily_limit_cents,
                "hourly spend cap is not tighter than the daily cap"
            );
        }

        Ok(Self {
            min_order_cents,
            max_order_cents,
            daily_limit_cents,
            hourly_limit_cents,
            idempotency_bucket_ms,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Memory,
    LibSql,
}

impl DatabaseBackend {
    fn parse(value: &str, key: &str) -> Result<Self, ConfigError> {
        match normalize_variant(value).as_str() {
            "memory" | "in_memory" => Ok(Self::Memory),
            "libsql" | "sqlite" | "turso" => Ok(Self::LibSql),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected 'memory' or 'libsql', got '{value}'"),
            }),
        }
    }
}

/// Store backend configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub libsql_path: PathBuf,
    pub libsql_url: Option<String>,
    pub libsql_auth_token: Option<SecretString>,
}

/// Default libSQL file (`~/.tradegate/tradegate.db`).
pub fn default_libsql_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tradegate")
        .join("tradegate.db")
}

impl DatabaseConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let default_backend = if cfg!(feature = "libsql") {
            "libsql"
        } else {
            "memory"
        };
        let backend = DatabaseBackend::parse(
            &optional_env("DATABASE_BACKEND")?
                .or_else(|| settings.database.backend.clone())
                .unwrap_or_else(|| default_backend.to_string()),
            "DATABASE_BACKEND",
        )?;

        let libsql_path = optional_env("LIBSQL_PATH")?
            .or_else(|| settings.database.libsql_path.clone())
            .map(PathBuf::from)
            .unwrap_or_else(default_libsql_path);

        let libsql_url =
            optional_env("LIBSQL_URL")?.or_else(|| settings.database.libsql_url.clone());
        let libsql_auth_token = optional_env("LIBSQL_AUTH_TOKEN")?.map(SecretString::from);

        if libsql_url.is_some() && libsql_auth_token.is_none() {
            return Err(ConfigError::MissingRequired {
                key: "LIBSQL_AUTH_TOKEN".to_string(),
                hint: "Remote replica sync needs a Turso auth token.".to_string(),
            });
        }

        Ok(Self {
            backend,
            libsql_path,
            libsql_url,
            libsql_auth_token,
        })
    }
}
