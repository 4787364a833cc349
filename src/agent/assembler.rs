//! Turns a validated intent into an idempotent [`TradeRequest`].

use crate::agent::intent::{
    INTENT_ARTIFACT_HASH_ALGORITHM, MarketSnapshot, Outcome, TradeRequest, ValidatedIntent,
};

#[derive(Debug, Clone, Copy)]
pub struct TradeRequestAssembler {
    bucket_ms: i64,
}

impl TradeRequestAssembler {
    /// `bucket_ms` must be positive; non-positive values fall back to 5 minutes.
    pub fn new(bucket_ms: i64) -> Self {
        let bucket_ms = if bucket_ms > 0 {
            bucket_ms
        } else {
            5 * 60 * 1000
        };
        Self { bucket_ms }
    }

    pub fn time_bucket(&self, now_ms: i64) -> i64 {
        now_ms.div_euclid(self.bucket_ms)
    }

    /// Same identity, market, side and amount inside one bucket share a key.
    pub fn idempotency_key(
        &self,
        identity: &str,
        market_id: &str,
        outcome: Outcome,
        amount_cents: i64,
        now_ms: i64,
    ) -> String {
        // Fixed keys of strings and integers: rendering cannot fail and is canonical.
        let seed = serde_json::json!({
            "algorithm": INTENT_ARTIFACT_HASH_ALGORITHM,
            "identity": identity,
            "market_id": market_id,
            "outcome": outcome.as_str(),
            "amount_cents": amount_cents,
            "time_bucket": self.time_bucket(now_ms),
        });
        blake3::hash(seed.to_string().as_bytes())
            .to_hex()
            .to_string()
    }

    /// Build the request from `intent` and the market snapshot read for it.
    pub fn build(
        &self,
        intent: &ValidatedIntent,
        identity: &str,
        market: &MarketSnapshot,
        now_ms: i64,
    ) -> TradeRequest {
        let idempotency_key = self.idempotency_key(
            identity,
            &market.id,
            intent.outcome,
            intent.amount_cents,
            now_ms,
        );
        TradeRequest {
            identity: identity.to_string(),
            account_id: intent.account_id.clone(),
            market: market.clone(),
            outcome: intent.outcome,
            amount_cents: intent.amount_cents,
            idempotency_key,
            built_at_ms: now_ms,
        }
    }
}

impl Default for TradeRequestAssembler {
    fn default() -> Self {
        Self::new(5 * 60 * 1000)
    }
}
