//! Intent triage, validation and trade-request assembly, plus the link
//! command surface.

pub mod assembler;
pub mod classifier;
pub mod commands;
pub mod context;
pub mod gate;
pub mod intent;
pub mod router;
pub mod validator;

pub use assembler::TradeRequestAssembler;
pub use classifier::{IntentClass, IntentClassifier};
pub use commands::{CommandOutcome, LinkCommandHandler};
pub use context::{ContextBuilder, ValidationContext};
pub use gate::TradeGate;
pub use intent::{
    AgentOutput, MarketSnapshot, MarketStatus, Outcome, TradeRequest, TradeResult,
    ValidatedIntent,
};
pub use router::{LinkCommand, Router};
pub use validator::validate;
