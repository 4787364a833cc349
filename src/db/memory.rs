//! Process-local store used by tests and the `memory` backend.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::agent::intent::MarketSnapshot;
use crate::db::{
    AccountLinkStore, ChallengeStore, DAY_MS, Database, HOUR_MS, MarketDirectory, SpendLedger,
    SpendTotals, window_start,
};
use crate::error::DatabaseError;
use crate::link::{AccountLink, Challenge};

#[derive(Default)]
struct ChallengeTable {
    by_identity: HashMap<String, Challenge>,
    identity_by_nonce: HashMap<String, String>,
}

struct SpendEntry {
    idempotency_key: String,
    amount_cents: i64,
    at_ms: i64,
}

#[derive(Default)]
struct SpendTable {
    by_identity: HashMap<String, Vec<SpendEntry>>,
    keys: HashSet<String>,
}

#[derive(Default)]
pub struct InMemoryBackend {
    challenges: Mutex<ChallengeTable>,
    links: Mutex<HashMap<String, AccountLink>>,
    spend: Mutex<SpendTable>,
    markets: Mutex<HashMap<String, MarketSnapshot>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_markets(markets: impl IntoIterator<Item = MarketSnapshot>) -> Self {
        let markets = markets
            .into_iter()
            .map(|market| (market.id.clone(), market))
            .collect();
        Self {
            markets: Mutex::new(markets),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ChallengeStore for InMemoryBackend {
    async fn create(&self, challenge: &Challenge) -> Result<(), DatabaseError> {
        let mut table = self.challenges.lock().await;
        if let Some(previous) = table
            .by_identity
            .insert(challenge.identity.clone(), challenge.clone())
        {
            table.identity_by_nonce.remove(&previous.nonce);
        }
        table
            .identity_by_nonce
            .insert(challenge.nonce.clone(), challenge.identity.clone());
        Ok(())
    }

    async fn get_active(&self, identity: &str) -> Result<Option<Challenge>, DatabaseError> {
        Ok(self.challenges.lock().await.by_identity.get(identity).cloned())
    }

    async fn mark_used(&self, nonce: &str) -> Result<bool, DatabaseError> {
        let mut table = self.challenges.lock().await;
        let Some(identity) = table.identity_by_nonce.get(nonce).cloned() else {
            return Ok(false);
        };
        match table.by_identity.get_mut(&identity) {
            Some(challenge) if challenge.nonce == nonce && !challenge.used => {
                challenge.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired(&self, now_ms: i64) -> Result<usize, DatabaseError> {
        let mut table = self.challenges.lock().await;
        let expired: Vec<(String, String)> = table
            .by_identity
            .values()
            .filter(|c| c.expires_at_ms < now_ms)
            .map(|c| (c.identity.clone(), c.nonce.clone()))
            .collect();
        for (identity, nonce) in &expired {
            table.by_identity.remove(identity);
            table.identity_by_nonce.remove(nonce);
        }
        Ok(expired.len())
    }
}

#[async_trait]
impl AccountLinkStore for InMemoryBackend {
    async fn link(&self, identity: &str, account_id: &str, at_ms: i64) -> Result<(), DatabaseError> {
        self.links.lock().await.insert(
            identity.to_string(),
            AccountLink {
                identity: identity.to_string(),
                linked_account_id: account_id.to_string(),
                linked_at_ms: at_ms,
            },
        );
        Ok(())
    }

    async fn get_link(&self, identity: &str) -> Result<Option<AccountLink>, DatabaseError> {
        Ok(self.links.lock().await.get(identity).cloned())
    }

    async fn unlink(&self, identity: &str) -> Result<bool, DatabaseError> {
        Ok(self.links.lock().await.remove(identity).is_some())
    }
}

#[async_trait]
impl SpendLedger for InMemoryBackend {
    async fn record(
        &self,
        identity: &str,
        idempotency_key: &str,
        amount_cents: i64,
        at_ms: i64,
    ) -> Result<bool, DatabaseError> {
        let mut spend = self.spend.lock().await;
        if !spend.keys.insert(idempotency_key.to_string()) {
            return Ok(false);
        }
        spend
            .by_identity
            .entry(identity.to_string())
            .or_default()
            .push(SpendEntry {
                idempotency_key: idempotency_key.to_string(),
                amount_cents,
                at_ms,
            });
        Ok(true)
    }

    async fn totals(&self, identity: &str, now_ms: i64) -> Result<SpendTotals, DatabaseError> {
        let spend = self.spend.lock().await;
        let Some(entries) = spend.by_identity.get(identity) else {
            return Ok(SpendTotals::default());
        };
        let day = window_start(now_ms, DAY_MS);
        let hour = window_start(now_ms, HOUR_MS);
        let mut totals = SpendTotals::default();
        for entry in entries {
            if window_start(entry.at_ms, DAY_MS) == day {
                totals.today_cents += entry.amount_cents;
            }
            if window_start(entry.at_ms, HOUR_MS) == hour {
                totals.this_hour_cents += entry.amount_cents;
            }
        }
        Ok(totals)
    }

    async fn prune_before(&self, before_ms: i64) -> Result<usize, DatabaseError> {
        let mut spend = self.spend.lock().await;
        let SpendTable { by_identity, keys } = &mut *spend;
        let mut pruned = 0;
        by_identity.retain(|_, entries| {
            entries.retain(|entry| {
                if entry.at_ms < before_ms {
                    keys.remove(&entry.idempotency_key);
                    pruned += 1;
                    false
                } else {
                    true
                }
            });
            !entries.is_empty()
        });
        Ok(pruned)
    }
}

#[async_trait]
impl MarketDirectory for InMemoryBackend {
    async fn lookup(&self, market_id: &str) -> Result<Option<MarketSnapshot>, DatabaseError> {
        Ok(self.markets.lock().await.get(market_id).cloned())
    }
}

#[async_trait]
impl Database for InMemoryBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn upsert_market(&self, market: &MarketSnapshot) -> Result<(), DatabaseError> {
        self.markets
            .lock()
            .await
            .insert(market.id.clone(), market.clone());
        Ok(())
    }
}
