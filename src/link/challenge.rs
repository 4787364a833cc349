//! Time-bounded, single-use link challenges.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::config::LinkConfig;
use crate::db::ChallengeStore;
use crate::error::LinkErrorCode;

/// Random bytes per nonce (128 bits).
const NONCE_BYTES: usize = 16;

/// One proof-of-ownership request.
///
/// `used` only ever moves from `false` to `true`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Challenge {
    pub identity: String,
    pub nonce: String,
    pub issued_at_ms: i64,
    pub expires_at_ms: i64,
    pub used: bool,
}

impl Challenge {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at_ms
    }

    /// The exact payload the wallet must personal-sign.
    ///
    /// Rendered only from stored fields so the verifying side reproduces the
    /// issued bytes regardless of what the caller echoes back.
    pub fn signing_message(&self, domain: &str) -> String {
        format!(
            "{domain} Account Link\nIdentity: {}\nNonce: {}\nIssued At: {}\nExpires At: {}\n\nSign this message to prove you control this account. Signing is free and does not send a transaction.",
            self.identity,
            self.nonce,
            render_ms(self.issued_at_ms),
            render_ms(self.expires_at_ms),
        )
    }
}

fn render_ms(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| ms.to_string())
}

fn random_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues, reads and consumes challenges; owns the TTL policy.
pub struct ChallengeService {
    store: Arc<dyn ChallengeStore>,
    ttl_ms: i64,
    message_domain: String,
}

impl ChallengeService {
    pub fn new(store: Arc<dyn ChallengeStore>, config: &LinkConfig) -> Self {
        Self {
            store,
            ttl_ms: config.challenge_ttl_ms,
            message_domain: config.message_domain.clone(),
        }
    }

    /// Issue a fresh challenge, replacing any prior one for `identity`.
    pub async fn issue(&self, identity: &str, now_ms: i64) -> Result<Challenge, LinkErrorCode> {
        let challenge = Challenge {
            identity: identity.to_string(),
            nonce: random_nonce(),
            issued_at_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(self.ttl_ms),
            used: false,
        };
        self.store.create(&challenge).await?;
        tracing::info!(
            identity,
            expires_at_ms = challenge.expires_at_ms,
            "Link challenge issued"
        );
        Ok(challenge)
    }

    /// Current challenge for `identity`, if any. Never mutates it.
    pub async fn get_active(&self, identity: &str) -> Result<Option<Challenge>, LinkErrorCode> {
        Ok(self.store.get_active(identity).await?)
    }

    /// True iff the challenge exists, matches `nonce`, is unused and unexpired.
    pub fn is_valid(challenge: Option<&Challenge>, nonce: &str, now_ms: i64) -> bool {
        let Some(challenge) = challenge else {
            return false;
        };
        let nonce_matches: bool = challenge
            .nonce
            .as_bytes()
            .ct_eq(nonce.as_bytes())
            .into();
        nonce_matches && !challenge.used && !challenge.is_expired(now_ms)
    }

    /// Consume the challenge owning `nonce`.
    ///
    /// Returns `true` only for the call that flipped `used`; repeated or
    /// racing calls, and nonces orphaned by a re-issue, return `false`.
    pub async fn mark_used(&self, nonce: &str) -> Result<bool, LinkErrorCode> {
        Ok(self.store.mark_used(nonce).await?)
    }

    /// Message the holder of `challenge` must sign.
    pub fn signing_message(&self, challenge: &Challenge) -> String {
        challenge.signing_message(&self.message_domain)
    }

    /// Drop challenges that expired before `now_ms`. Housekeeping only.
    pub async fn sweep_expired(&self, now_ms: i64) -> Result<usize, LinkErrorCode> {
        let purged = self.store.purge_expired(now_ms).await?;
        if purged > 0 {
            tracing::debug!(purged, "Swept expired link challenges");
        }
        Ok(purged)
    }
}
