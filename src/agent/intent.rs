//! Typed artifacts for the intent -> validation -> request pipeline.
//!
//! [`AgentOutput`] is whatever the natural-language extractor guessed. It is
//! untrusted end to end: only the closed set of variants below is accepted,
//! and every field is re-checked before anything is assembled from it.

use serde::{Deserialize, Serialize};

/// Hash algorithm used for deterministic artifact digests.
pub const INTENT_ARTIFACT_HASH_ALGORITHM: &str = "blake3";

/// Binary market side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    #[serde(alias = "yes", alias = "Yes")]
    Yes,
    #[serde(alias = "no", alias = "No")]
    No,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "YES",
            Self::No => "NO",
        }
    }
}

/// Structured guess produced by the intent extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum AgentOutput {
    PlaceBet {
        identity: String,
        market_id: String,
        outcome: Outcome,
        amount_cents: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_text: Option<String>,
    },
    GetBalance {
        identity: String,
    },
    GetTradeHistory {
        identity: String,
    },
    QueryMarket {
        identity: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
    },
}

impl AgentOutput {
    /// Parse extractor output. Anything outside the closed union is `None`.
    pub fn from_json(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::debug!(error = %e, "Discarding unparseable extractor output");
                None
            }
        }
    }

    /// Identity the extractor claims the request is for. Never trusted alone.
    pub fn claimed_identity(&self) -> &str {
        match self {
            Self::PlaceBet { identity, .. }
            | Self::GetBalance { identity }
            | Self::GetTradeHistory { identity }
            | Self::QueryMarket { identity, .. } => identity,
        }
    }

    pub fn market_id(&self) -> Option<&str> {
        match self {
            Self::PlaceBet { market_id, .. } => Some(market_id),
            _ => None,
        }
    }

    /// Stable label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PlaceBet { .. } => "place_bet",
            Self::GetBalance { .. } => "get_balance",
            Self::GetTradeHistory { .. } => "get_trade_history",
            Self::QueryMarket { .. } => "query_market",
        }
    }
}

/// Lifecycle state of a market as reported by the market directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarketStatus {
    Active,
    Paused,
    Closed,
    Resolved,
}

impl MarketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Closed => "closed",
            Self::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" | "open" => Some(Self::Active),
            "paused" | "halted" => Some(Self::Paused),
            "closed" => Some(Self::Closed),
            "resolved" | "settled" => Some(Self::Resolved),
            _ => None,
        }
    }
}

/// Market as seen at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarketSnapshot {
    pub id: String,
    pub status: MarketStatus,
}

/// A `place_bet` intent that passed every validator check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidatedIntent {
    pub identity: String,
    pub account_id: String,
    pub market: MarketSnapshot,
    pub outcome: Outcome,
    pub amount_cents: i64,
}

/// Fully specified request handed to the execution collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TradeRequest {
    pub identity: String,
    pub account_id: String,
    pub market: MarketSnapshot,
    pub outcome: Outcome,
    pub amount_cents: i64,
    pub idempotency_key: String,
    pub built_at_ms: i64,
}

/// Execution collaborator's answer for one [`TradeRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TradeResult {
    Executed {
        trade_id: String,
        executed_at_ms: i64,
        identity: String,
        market_id: String,
        outcome: Outcome,
        amount_cents: i64,
        idempotency_key: String,
    },
    Failed {
        idempotency_key: String,
        error_code: String,
        failed_at_ms: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_place_bet() {
        let raw = r#"{"intent":"place_bet","identity":"u1","market_id":"m1","outcome":"YES","amount_cents":500}"#;
        assert_eq!(
            AgentOutput::from_json(raw),
            Some(AgentOutput::PlaceBet {
                identity: "u1".to_string(),
                market_id: "m1".to_string(),
                outcome: Outcome::Yes,
                amount_cents: 500,
                raw_text: None,
            })
        );
    }

    #[test]
    fn accepts_lowercase_outcome_and_read_variants() {
        let raw = r#"{"intent":"place_bet","identity":"u1","market_id":"m1","outcome":"no","amount_cents":-100,"raw_text":"bet"}"#;
        let output = AgentOutput::from_json(raw).unwrap();
        assert_eq!(output.claimed_identity(), "u1");
        assert_eq!(output.market_id(), Some("m1"));

        let balance = AgentOutput::from_json(r#"{"intent":"get_balance","identity":"u2"}"#).unwrap();
        assert_eq!(balance.label(), "get_balance");
        assert_eq!(balance.market_id(), None);
    }

    #[test]
    fn rejects_anything_outside_the_union() {
        for raw in [
            "",
            "not json",
            r#"{"intent":"withdraw_all","identity":"u1"}"#,
            r#"{"intent":"place_bet","identity":"u1","market_id":"m1","outcome":"MAYBE","amount_cents":5}"#,
            r#"{"intent":"place_bet","identity":"u1","market_id":"m1","outcome":"YES","amount_cents":5.5}"#,
            r#"{"intent":"place_bet","identity":"u1","outcome":"YES","amount_cents":5}"#,
            r#"{"identity":"u1"}"#,
        ] {
            assert_eq!(AgentOutput::from_json(raw), None, "accepted {raw}");
        }
    }

    #[test]
    fn market_status_parse() {
        assert_eq!(MarketStatus::parse(" Active "), Some(MarketStatus::Active));
        assert_eq!(MarketStatus::parse("settled"), Some(MarketStatus::Resolved));
        assert_eq!(MarketStatus::parse("bogus"), None);
    }

    #[test]
    fn trade_result_tagging() {
        let failed = TradeResult::Failed {
            idempotency_key: "k".to_string(),
            error_code: "VENUE_REJECTED".to_string(),
            failed_at_ms: 5,
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["idempotency_key"], "k");
    }
}
