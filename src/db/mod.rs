//! Storage seams for challenges, account links, spend and markets.
//!
//! Every store is an `async_trait` so the in-memory backend (tests, dev) and
//! the libSQL backend are interchangeable behind `Arc<dyn Database>`.

#[cfg(feature = "libsql")]
pub mod libsql;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::intent::{MarketSnapshot, MarketStatus};
use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::error::DatabaseError;
use crate::link::{AccountLink, Challenge};
use crate::settings::MarketSettings;

/// Fixed UTC day window.
pub const DAY_MS: i64 = 86_400_000;
/// Fixed clock-hour window.
pub const HOUR_MS: i64 = 3_600_000;

/// Start of the fixed window of `window_ms` containing `now_ms`.
pub fn window_start(now_ms: i64, window_ms: i64) -> i64 {
    now_ms - now_ms.rem_euclid(window_ms)
}

/// At most one challenge per identity; `create` replaces the previous one.
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn create(&self, challenge: &Challenge) -> Result<(), DatabaseError>;

    async fn get_active(&self, identity: &str) -> Result<Option<Challenge>, DatabaseError>;

    /// Atomic compare-and-set of `used` from false to true.
    ///
    /// `true` only for the single caller that performed the flip. Nonces no
    /// longer owned by their identity's current challenge return `false`.
    async fn mark_used(&self, nonce: &str) -> Result<bool, DatabaseError>;

    /// Delete challenges with `expires_at_ms < now_ms`. Returns the count.
    async fn purge_expired(&self, now_ms: i64) -> Result<usize, DatabaseError>;
}

#[async_trait]
pub trait AccountLinkStore: Send + Sync {
    /// Upsert; relinking overwrites.
    async fn link(&self, identity: &str, account_id: &str, at_ms: i64)
    -> Result<(), DatabaseError>;

    async fn get_link(&self, identity: &str) -> Result<Option<AccountLink>, DatabaseError>;

    /// Returns whether a link existed.
    async fn unlink(&self, identity: &str) -> Result<bool, DatabaseError>;
}

/// Settled spend in the windows containing a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendTotals {
    pub today_cents: i64,
    pub this_hour_cents: i64,
}

#[async_trait]
pub trait SpendLedger: Send + Sync {
    /// Record one settled trade under its idempotency key.
    ///
    /// Returns `false` when the key is already recorded; the totals are
    /// left unchanged in that case.
    async fn record(
        &self,
        identity: &str,
        idempotency_key: &str,
        amount_cents: i64,
        at_ms: i64,
    ) -> Result<bool, DatabaseError>;

    async fn totals(&self, identity: &str, now_ms: i64) -> Result<SpendTotals, DatabaseError>;

    /// Delete records with `at_ms < before_ms`. Returns the count.
    async fn prune_before(&self, before_ms: i64) -> Result<usize, DatabaseError>;
}

#[async_trait]
pub trait MarketDirectory: Send + Sync {
    async fn lookup(&self, market_id: &str) -> Result<Option<MarketSnapshot>, DatabaseError>;
}

/// Everything a running gate needs from storage.
#[async_trait]
pub trait Database: ChallengeStore + AccountLinkStore + SpendLedger + MarketDirectory {
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    async fn upsert_market(&self, market: &MarketSnapshot) -> Result<(), DatabaseError>;
}

/// Open the configured backend and run its migrations.
pub async fn connect_from_config(
    config: &DatabaseConfig,
) -> Result<Arc<dyn Database>, DatabaseError> {
    match config.backend {
        DatabaseBackend::Memory => {
            tracing::info!("Using in-memory store");
            Ok(Arc::new(memory::InMemoryBackend::new()))
        }
        #[cfg(feature = "libsql")]
        DatabaseBackend::LibSql => {
            use secrecy::ExposeSecret;

            let backend = match (&config.libsql_url, &config.libsql_auth_token) {
                (Some(url), Some(token)) => {
                    self::libsql::LibSqlBackend::new_remote_replica(
                        &config.libsql_path,
                        url,
                        token.expose_secret(),
                    )
                    .await?
                }
                _ => self::libsql::LibSqlBackend::new_local(&config.libsql_path).await?,
            };
            backend.run_migrations().await?;
            tracing::info!(path = %config.libsql_path.display(), "Using libSQL store");
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "libsql"))]
        DatabaseBackend::LibSql => Err(DatabaseError::Pool(
            "libSQL backend requested but the 'libsql' feature is disabled".to_string(),
        )),
    }
}

/// Load configured markets into the directory. Unknown statuses are skipped.
pub async fn seed_markets(
    db: &dyn Database,
    markets: &[MarketSettings],
) -> Result<usize, DatabaseError> {
    let mut seeded = 0;
    for market in markets {
        let Some(status) = MarketStatus::parse(&market.status) else {
            tracing::warn!(
                market = %market.id,
                status = %market.status,
                "Skipping market with unknown status"
            );
            continue;
        };
        db.upsert_market(&MarketSnapshot {
            id: market.id.clone(),
            status,
        })
        .await?;
        seeded += 1;
    }
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_start_aligns_to_utc_boundaries() {
        assert_eq!(window_start(0, DAY_MS), 0);
        assert_eq!(window_start(DAY_MS - 1, DAY_MS), 0);
        assert_eq!(window_start(DAY_MS, DAY_MS), DAY_MS);
        assert_eq!(window_start(HOUR_MS * 3 + 5, HOUR_MS), HOUR_MS * 3);
        assert_eq!(window_start(-1, HOUR_MS), -HOUR_MS);
    }

    #[tokio::test]
    async fn memory_backend_from_config() {
        let config = DatabaseConfig {
            backend: DatabaseBackend::Memory,
            libsql_path: "unused.db".into(),
            libsql_url: None,
            libsql_auth_token: None,
        };
        let db = connect_from_config(&config).await.unwrap();
        let seeded = seed_markets(
            db.as_ref(),
            &[
                MarketSettings {
                    id: "m1".to_string(),
                    status: "active".to_string(),
                },
                MarketSettings {
                    id: "m2".to_string(),
                    status: "mystery".to_string(),
                },
            ],
        )
        .await
        .unwrap();
        assert_eq!(seeded, 1);
        assert_eq!(
            db.lookup("m1").await.unwrap().map(|m| m.status),
            Some(MarketStatus::Active)
        );
        assert!(db.lookup("m2").await.unwrap().is_none());
    }
}
