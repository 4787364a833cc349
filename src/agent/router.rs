//! Account-link command routing.
//!
//! Only the fixed link surface is parsed here. Anything else returns `None`
//! and goes to the `IntentClassifier`.

use crate::channels::IncomingMessage;

pub const VERIFY_USAGE: &str = "verify <accountId> <nonce> <signature>";

/// A recognized account-link command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    /// `connect account`
    ConnectAccount,
    /// `verify <accountId> <nonce> <signature>`
    Verify {
        account_id: String,
        nonce: String,
        signature: String,
    },
    /// `disconnect`
    Disconnect,
    /// `status` / `account status`
    Status,
    /// A link command with the wrong shape.
    Malformed { usage: &'static str },
}

impl LinkCommand {
    /// Stable label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ConnectAccount => "link.connect",
            Self::Verify { .. } => "link.verify",
            Self::Disconnect => "link.disconnect",
            Self::Status => "link.status",
            Self::Malformed { .. } => "link.malformed",
        }
    }
}

/// Parses link commands; command words are case-insensitive.
pub struct Router {
    /// Optional command prefix (e.g., "/"), stripped when present.
    command_prefix: String,
}

impl Router {
    pub fn new() -> Self {
        Self {
            command_prefix: "/".to_string(),
        }
    }

    /// Set the command prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.command_prefix = prefix.into();
        self
    }

    /// Route a message to a link command, or `None` if it is not one.
    pub fn route(&self, message: &IncomingMessage) -> Option<LinkCommand> {
        let content = message.content.trim();
        let content = content
            .strip_prefix(self.command_prefix.as_str())
            .unwrap_or(content);
        let parts: Vec<&str> = content.split_whitespace().collect();
        let words: Vec<String> = parts.iter().map(|part| part.to_lowercase()).collect();
        let words: Vec<&str> = words.iter().map(String::as_str).collect();

        match words.as_slice() {
            ["connect"] | ["connect", "account"] => Some(LinkCommand::ConnectAccount),
            ["disconnect"] | ["disconnect", "account"] => Some(LinkCommand::Disconnect),
            ["status"] | ["account", "status"] => Some(LinkCommand::Status),
            ["verify", ..] => Some(match parts.as_slice() {
                [_, account_id, nonce, signature] => LinkCommand::Verify {
                    account_id: account_id.to_string(),
                    nonce: nonce.to_string(),
                    signature: signature.to_string(),
                },
                _ => LinkCommand::Malformed {
                    usage: VERIFY_USAGE,
                },
            }),
            _ => None,
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(content: &str) -> Option<LinkCommand> {
        Router::new().route(&IncomingMessage::new("test", "user", content))
    }

    #[test]
    fn test_connect_and_disconnect() {
        assert_eq!(route("connect account"), Some(LinkCommand::ConnectAccount));
        assert_eq!(route("  CONNECT Account "), Some(LinkCommand::ConnectAccount));
        assert_eq!(route("/connect"), Some(LinkCommand::ConnectAccount));
        assert_eq!(route("Disconnect"), Some(LinkCommand::Disconnect));
        assert_eq!(route("account status"), Some(LinkCommand::Status));
    }

    #[test]
    fn test_verify_keeps_argument_case() {
        assert_eq!(
            route("VERIFY 0xAbC 00ff 0xDEAD"),
            Some(LinkCommand::Verify {
                account_id: "0xAbC".to_string(),
                nonce: "00ff".to_string(),
                signature: "0xDEAD".to_string(),
            })
        );
    }

    #[test]
    fn test_malformed_verify() {
        for content in ["verify", "verify 0xabc", "verify 0xabc n1", "verify a b c d"] {
            assert_eq!(
                route(content),
                Some(LinkCommand::Malformed {
                    usage: VERIFY_USAGE
                }),
                "{content}"
            );
        }
    }

    #[test]
    fn test_non_command_returns_none() {
        assert_eq!(route("buy $5 of YES"), None);
        assert_eq!(route("connect my account please"), None);
        assert_eq!(route(""), None);
    }

    #[test]
    fn test_custom_prefix() {
        let router = Router::new().with_prefix("!");
        let msg = IncomingMessage::new("test", "user", "!status");
        assert_eq!(router.route(&msg), Some(LinkCommand::Status));
        assert_eq!(LinkCommand::Status.label(), "link.status");
    }
}
