//! Per-request snapshot the validator decides against.

use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::intent::MarketSnapshot;
use crate::config::TradeLimitsConfig;
use crate::db::{AccountLinkStore, MarketDirectory, SpendLedger};
use crate::error::ValidationErrorCode;

/// Read-only view of one identity's state at `built_at_ms`.
///
/// Built fresh for every action and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationContext {
    pub identity: String,
    pub linked_account_id: Option<String>,
    pub markets: HashMap<String, MarketSnapshot>,
    pub limits: TradeLimitsConfig,
    pub spent_today_cents: i64,
    pub spent_this_hour_cents: i64,
    pub built_at_ms: i64,
}

impl ValidationContext {
    pub fn market_lookup(&self, market_id: &str) -> Option<&MarketSnapshot> {
        self.markets.get(market_id)
    }

    pub fn daily_limit_cents(&self) -> i64 {
        self.limits.daily_limit_cents
    }

    pub fn hourly_limit_cents(&self) -> i64 {
        self.limits.hourly_limit_cents
    }
}

/// Assembles a [`ValidationContext`] from the stores.
pub struct ContextBuilder {
    links: Arc<dyn AccountLinkStore>,
    markets: Arc<dyn MarketDirectory>,
    ledger: Arc<dyn SpendLedger>,
    limits: TradeLimitsConfig,
}

impl ContextBuilder {
    pub fn new(
        links: Arc<dyn AccountLinkStore>,
        markets: Arc<dyn MarketDirectory>,
        ledger: Arc<dyn SpendLedger>,
        limits: TradeLimitsConfig,
    ) -> Self {
        Self {
            links,
            markets,
            ledger,
            limits,
        }
    }

    /// Snapshot for `identity`, resolving only the markets the request names.
    ///
    /// Any store failure aborts with `STORE_UNAVAILABLE`; a missing link or
    /// market is a legitimate miss and stays `None` in the snapshot.
    pub async fn build(
        &self,
        identity: &str,
        market_ids: &[&str],
        now_ms: i64,
    ) -> Result<ValidationContext, ValidationErrorCode> {
        let linked_account_id = self
            .links
            .get_link(identity)
            .await?
            .map(|link| link.linked_account_id);

        let mut markets = HashMap::new();
        for market_id in market_ids {
            if let Some(market) = self.markets.lookup(market_id).await? {
                markets.insert(market.id.clone(), market);
            }
        }

        let totals = self.ledger.totals(identity, now_ms).await?;

        Ok(ValidationContext {
            identity: identity.to_string(),
            linked_account_id,
            markets,
            limits: self.limits,
            spent_today_cents: totals.today_cents,
            spent_this_hour_cents: totals.this_hour_cents,
            built_at_ms: now_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::intent::MarketStatus;
    use crate::db::memory::InMemoryBackend;

    #[tokio::test]
    async fn build_snapshots_link_market_and_spend() {
        let db = Arc::new(InMemoryBackend::with_markets([MarketSnapshot {
            id: "m1".to_string(),
            status: MarketStatus::Active,
        }]));
        db.link("u1", "0xabc", 0).await.unwrap();
        db.record("u1", "k1", 200, 1_000).await.unwrap();

        let builder = ContextBuilder::new(
            db.clone(),
            db.clone(),
            db.clone(),
            TradeLimitsConfig::default(),
        );
        let context = builder.build("u1", &["m1", "m2"], 2_000).await.unwrap();

        assert_eq!(context.linked_account_id.as_deref(), Some("0xabc"));
        assert!(context.market_lookup("m1").is_some());
        assert!(context.market_lookup("m2").is_none());
        assert_eq!(context.spent_today_cents, 200);
        assert_eq!(context.spent_this_hour_cents, 200);
        assert_eq!(context.daily_limit_cents(), 500);
        assert_eq!(context.hourly_limit_cents(), 500);
    }

    #[tokio::test]
    async fn unlinked_identity_has_no_account() {
        let db = Arc::new(InMemoryBackend::new());
        let builder = ContextBuilder::new(
            db.clone(),
            db.clone(),
            db.clone(),
            TradeLimitsConfig::default(),
        );
        let context = builder.build("ghost", &[], 0).await.unwrap();
        assert!(context.linked_account_id.is_none());
        assert_eq!(context.spent_today_cents, 0);
    }
}
