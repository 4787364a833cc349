//! tradegate: wallet-ownership linking and deterministic trade-intent gating
//! for chat-driven trading agents.
//!
//! Two independent paths share one store:
//!
//! - [`link`]: `connect account` issues a single-use challenge, the user
//!   personal-signs it, and `verify` proves control of the account before
//!   the identity -> account link is persisted.
//! - [`agent`]: free text is triaged READ/WRITE, extractor output is checked
//!   against a fresh [`agent::ValidationContext`], and only then assembled
//!   into an idempotent [`agent::TradeRequest`] for the execution collaborator.

pub mod agent;
pub mod app;
pub mod bootstrap;
pub mod channels;
pub mod config;
pub mod db;
pub mod error;
pub mod link;
pub mod settings;

pub use app::{App, Reply};
pub use config::Config;
pub use error::{ChannelError, Error, LinkErrorCode, Result, ValidationErrorCode};
