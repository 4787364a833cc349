//! Wires config and a store into the link and trade services.
//!
//! In a full deployment free text is classified first and only WRITE
//! messages reach the extractor, whose JSON then goes to the gate. This
//! in-process transport has no extractor: it accepts extractor JSON typed
//! directly and hands it to the gate without classifying it. The gate
//! validates it either way.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::agent::{
    AgentOutput, CommandOutcome, ContextBuilder, IntentClass, IntentClassifier,
    LinkCommandHandler, Router, TradeGate, TradeRequest, TradeRequestAssembler,
};
use crate::channels::IncomingMessage;
use crate::config::Config;
use crate::db::{Database, SpendLedger, connect_from_config, seed_markets};
use crate::error::{self, LinkErrorCode, ValidationErrorCode};
use crate::link::{
    ChallengeService, LinkPersistenceService, SignatureVerifier, VerificationService,
    spawn_sweeper,
};

/// What one inbound message turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Link(Result<CommandOutcome, LinkErrorCode>),
    Trade(Result<TradeRequest, ValidationErrorCode>),
    /// JSON that is not a recognized extractor output.
    Unrecognized,
    Classified(IntentClass),
}

pub struct App {
    config: Config,
    router: Router,
    classifier: IntentClassifier,
    challenges: Arc<ChallengeService>,
    ledger: Arc<dyn SpendLedger>,
    link_commands: LinkCommandHandler,
    gate: TradeGate,
}

impl App {
    pub fn new(config: Config, db: Arc<dyn Database>) -> Self {
        let challenges = Arc::new(ChallengeService::new(db.clone(), &config.link));
        let verification = VerificationService::new(challenges.clone(), SignatureVerifier::default());
        let link_commands = LinkCommandHandler::new(
            challenges.clone(),
            verification,
            LinkPersistenceService::new(db.clone()),
        );
        let context = ContextBuilder::new(db.clone(), db.clone(), db.clone(), config.trade_limits);
        let gate = TradeGate::new(
            context,
            TradeRequestAssembler::new(config.trade_limits.idempotency_bucket_ms),
            db.clone(),
        );
        Self {
            config,
            router: Router::new(),
            classifier: IntentClassifier::new(),
            challenges,
            ledger: db,
            link_commands,
            gate,
        }
    }

    /// Open the configured store, seed configured markets, and wire services.
    pub async fn connect(config: Config) -> error::Result<Self> {
        let db = connect_from_config(&config.database).await?;
        let seeded = seed_markets(db.as_ref(), &config.markets).await?;
        tracing::info!(markets = seeded, "Market directory seeded");
        Ok(Self::new(config, db))
    }

    pub fn gate(&self) -> &TradeGate {
        &self.gate
    }

    /// Start the background challenge and spend sweep at the configured interval.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        spawn_sweeper(
            self.challenges.clone(),
            self.ledger.clone(),
            self.config.link.sweep_interval,
        )
    }

    /// Route one message: link commands first, then extractor JSON, then
    /// READ/WRITE triage for everything else.
    pub async fn dispatch(&self, message: &IncomingMessage, now_ms: i64) -> Reply {
        let identity = message.user_id.as_str();
        tracing::debug!(channel = %message.channel, identity, "Dispatching message");

        if let Some(command) = self.router.route(message) {
            return Reply::Link(self.link_commands.handle(identity, &command, now_ms).await);
        }

        let content = message.content.trim();
        if content.starts_with('{') {
            return match AgentOutput::from_json(content) {
                Some(output) => Reply::Trade(self.gate.prepare(identity, &output, now_ms).await),
                None => Reply::Unrecognized,
            };
        }

        Reply::Classified(self.classifier.classify(content))
    }
}
