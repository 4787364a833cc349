//! Error types for tradegate.
//!
//! Infrastructure failures (configuration, storage, channels) are `thiserror`
//! enums that propagate with `?`. Business outcomes of the link protocol and
//! the trade validator are closed code enums: they are the only thing handed
//! back across the core's boundary, and transports map them to user text.

use serde::Serialize;

/// Top-level error type for the binary and long-lived tasks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Store-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[cfg(feature = "libsql")]
    #[error("LibSQL error: {0}")]
    LibSql(#[from] libsql::Error),
}

/// Transport failures.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },
}

/// Stable result codes of the account-link protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, thiserror::Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkErrorCode {
    /// No challenge, wrong nonce, expired, or already consumed.
    #[error("CHALLENGE_INVALID")]
    ChallengeInvalid,
    #[error("SIGNATURE_MISMATCH")]
    SignatureMismatch,
    #[error("LINK_NOT_FOUND")]
    LinkNotFound,
    #[error("STORE_UNAVAILABLE")]
    StoreUnavailable,
}

impl LinkErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChallengeInvalid => "CHALLENGE_INVALID",
            Self::SignatureMismatch => "SIGNATURE_MISMATCH",
            Self::LinkNotFound => "LINK_NOT_FOUND",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
        }
    }
}

impl From<DatabaseError> for LinkErrorCode {
    fn from(err: DatabaseError) -> Self {
        tracing::warn!(error = %err, "store call failed");
        Self::StoreUnavailable
    }
}

/// Stable rejection codes of the trade validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, thiserror::Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorCode {
    /// The identity echoed by the extractor is not the authenticated caller.
    #[error("IDENTITY_MISMATCH")]
    IdentityMismatch,
    /// The intent variant is not a trade (read-only intents are served elsewhere).
    #[error("NOT_ACTIONABLE")]
    NotActionable,
    #[error("ACCOUNT_NOT_CONNECTED")]
    AccountNotConnected,
    #[error("INVALID_MARKET")]
    InvalidMarket,
    #[error("MARKET_NOT_ACTIVE")]
    MarketNotActive,
    #[error("INVALID_AMOUNT")]
    InvalidAmount,
    #[error("LIMIT_EXCEEDED")]
    LimitExceeded,
    /// The validation context could not be assembled.
    #[error("STORE_UNAVAILABLE")]
    StoreUnavailable,
}

impl ValidationErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdentityMismatch => "IDENTITY_MISMATCH",
            Self::NotActionable => "NOT_ACTIONABLE",
            Self::AccountNotConnected => "ACCOUNT_NOT_CONNECTED",
            Self::InvalidMarket => "INVALID_MARKET",
            Self::MarketNotActive => "MARKET_NOT_ACTIVE",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::LimitExceeded => "LIMIT_EXCEEDED",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
        }
    }
}

impl From<DatabaseError> for ValidationErrorCode {
    fn from(err: DatabaseError) -> Self {
        tracing::warn!(error = %err, "store call failed while building validation context");
        Self::StoreUnavailable
    }
}

pub type Result<T> = std::result::Result<T, Error>;
