//! Deterministic gate between an extracted intent and a trade.
//!
//! Checks run in a fixed order and stop at the first failure, so the code a
//! caller sees is always the earliest unmet precondition.

use crate::agent::context::ValidationContext;
use crate::agent::intent::{AgentOutput, MarketStatus, ValidatedIntent};
use crate::error::ValidationErrorCode;

/// Validate `output` against `context`. Pure: no I/O, no clock.
pub fn validate(
    output: &AgentOutput,
    context: &ValidationContext,
) -> Result<ValidatedIntent, ValidationErrorCode> {
    if output.claimed_identity() != context.identity {
        return Err(ValidationErrorCode::IdentityMismatch);
    }

    let AgentOutput::PlaceBet {
        market_id,
        outcome,
        amount_cents,
        ..
    } = output
    else {
        return Err(ValidationErrorCode::NotActionable);
    };

    let Some(account_id) = context.linked_account_id.as_deref() else {
        return Err(ValidationErrorCode::AccountNotConnected);
    };

    let Some(market) = context.market_lookup(market_id) else {
        return Err(ValidationErrorCode::InvalidMarket);
    };

    if market.status != MarketStatus::Active {
        return Err(ValidationErrorCode::MarketNotActive);
    }

    let amount = *amount_cents;
    let limits = &context.limits;
    if amount <= 0 || amount < limits.min_order_cents || amount > limits.max_order_cents {
        return Err(ValidationErrorCode::InvalidAmount);
    }

    if exceeds(context.spent_today_cents, amount, context.daily_limit_cents())
        || exceeds(context.spent_this_hour_cents, amount, context.hourly_limit_cents())
    {
        return Err(ValidationErrorCode::LimitExceeded);
    }

    Ok(ValidatedIntent {
        identity: context.identity.clone(),
        account_id: account_id.to_string(),
        market: market.clone(),
        outcome: *outcome,
        amount_cents: amount,
    })
}

fn exceeds(spent: i64, amount: i64, limit: i64) -> bool {
    spent.checked_add(amount).is_none_or(|total| total > limit)
}
