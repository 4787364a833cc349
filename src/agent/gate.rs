//! Orchestrates identity check -> context -> validation -> assembly.

use std::sync::Arc;

use crate::agent::assembler::TradeRequestAssembler;
use crate::agent::context::ContextBuilder;
use crate::agent::intent::{AgentOutput, TradeRequest, TradeResult};
use crate::agent::validator::validate;
use crate::db::SpendLedger;
use crate::error::{DatabaseError, ValidationErrorCode};

/// The only path from extractor output to a [`TradeRequest`].
pub struct TradeGate {
    context: ContextBuilder,
    assembler: TradeRequestAssembler,
    ledger: Arc<dyn SpendLedger>,
}

impl TradeGate {
    pub fn new(
        context: ContextBuilder,
        assembler: TradeRequestAssembler,
        ledger: Arc<dyn SpendLedger>,
    ) -> Self {
        Self {
            context,
            assembler,
            ledger,
        }
    }

    /// Validate `output` for the authenticated `caller` and assemble a request.
    ///
    /// The echoed identity is checked before any store is touched.
    pub async fn prepare(
        &self,
        caller: &str,
        output: &AgentOutput,
        now_ms: i64,
    ) -> Result<TradeRequest, ValidationErrorCode> {
        if output.claimed_identity() != caller {
            tracing::warn!(
                caller,
                claimed = output.claimed_identity(),
                "Extractor echoed a different identity"
            );
            return Err(ValidationErrorCode::IdentityMismatch);
        }

        let market_ids: Vec<&str> = output.market_id().into_iter().collect();
        let context = self.context.build(caller, &market_ids, now_ms).await?;

        let intent = match validate(output, &context) {
            Ok(intent) => intent,
            Err(code) => {
                tracing::info!(
                    identity = caller,
                    intent = output.label(),
                    code = code.as_str(),
                    "Trade intent rejected"
                );
                return Err(code);
            }
        };

        let market = intent.market.clone();
        let request = self.assembler.build(&intent, caller, &market, now_ms);
        tracing::info!(
            identity = caller,
            market = %request.market.id,
            amount_cents = request.amount_cents,
            idempotency_key = %request.idempotency_key,
            "Trade request assembled"
        );
        Ok(request)
    }

    /// Feed an execution result back into the spend ledger.
    ///
    /// Only executed trades count against the windows, once per idempotency
    /// key. Returns whether anything was recorded.
    pub async fn settle(&self, result: &TradeResult) -> Result<bool, DatabaseError> {
        match result {
            TradeResult::Executed {
                identity,
                amount_cents,
                executed_at_ms,
                idempotency_key,
                ..
            } => {
                let recorded = self
                    .ledger
                    .record(identity, idempotency_key, *amount_cents, *executed_at_ms)
                    .await?;
                if !recorded {
                    tracing::info!(
                        idempotency_key = %idempotency_key,
                        "Trade result already settled; ignoring replay"
                    );
                    return Ok(false);
                }
                tracing::info!(
                    identity = %identity,
                    amount_cents,
                    idempotency_key = %idempotency_key,
                    "Trade settled"
                );
                Ok(true)
            }
            TradeResult::Failed {
                idempotency_key,
                error_code,
                ..
            } => {
                tracing::info!(
                    idempotency_key = %idempotency_key,
                    error_code = %error_code,
                    "Trade failed downstream; nothing recorded"
                );
                Ok(false)
            }
        }
    }
}
