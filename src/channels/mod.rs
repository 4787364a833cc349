//! Transports that feed messages into the link and trade paths.

pub mod repl;

use chrono::{DateTime, Utc};

/// A message from an authenticated sender on some channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Channel this message came from.
    pub channel: String,
    /// Authenticated identity of the sender.
    pub user_id: String,
    pub content: String,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(
        channel: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            user_id: user_id.into(),
            content: content.into(),
            received_at: Utc::now(),
        }
    }

    /// Receive time in epoch milliseconds.
    pub fn received_at_ms(&self) -> i64 {
        self.received_at.timestamp_millis()
    }
}
