//! Account-link command handling.
//!
//! Glue between the parsed [`LinkCommand`] surface and the link services.
//! Rendering outcomes for people is left to the transport.

use std::sync::Arc;

use serde::Serialize;

use crate::agent::router::LinkCommand;
use crate::error::LinkErrorCode;
use crate::link::{ChallengeService, LinkPersistenceService, VerificationService};

/// Result of a successfully handled link command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    ChallengeIssued {
        nonce: String,
        /// Exact bytes the wallet must personal-sign.
        message: String,
        expires_at_ms: i64,
    },
    Linked {
        account_id: String,
    },
    Disconnected,
    Status {
        linked_account_id: Option<String>,
    },
    Usage {
        usage: &'static str,
    },
}

pub struct LinkCommandHandler {
    challenges: Arc<ChallengeService>,
    verification: VerificationService,
    links: LinkPersistenceService,
}

impl LinkCommandHandler {
    pub fn new(
        challenges: Arc<ChallengeService>,
        verification: VerificationService,
        links: LinkPersistenceService,
    ) -> Self {
        Self {
            challenges,
            verification,
            links,
        }
    }

    pub async fn handle(
        &self,
        identity: &str,
        command: &LinkCommand,
        now_ms: i64,
    ) -> Result<CommandOutcome, LinkErrorCode> {
        tracing::debug!(identity, command = command.label(), "Handling link command");
        match command {
            LinkCommand::ConnectAccount => {
                let challenge = self.challenges.issue(identity, now_ms).await?;
                Ok(CommandOutcome::ChallengeIssued {
                    message: self.challenges.signing_message(&challenge),
                    nonce: challenge.nonce,
                    expires_at_ms: challenge.expires_at_ms,
                })
            }
            LinkCommand::Verify {
                account_id,
                nonce,
                signature,
            } => {
                let account_id = self
                    .verification
                    .verify_link(identity, nonce, account_id, signature, now_ms)
                    .await?;
                self.links.persist_link(identity, &account_id, now_ms).await?;
                Ok(CommandOutcome::Linked { account_id })
            }
            LinkCommand::Disconnect => {
                self.links.unlink(identity).await?;
                Ok(CommandOutcome::Disconnected)
            }
            LinkCommand::Status => Ok(CommandOutcome::Status {
                linked_account_id: self.links.get_linked_account(identity).await?,
            }),
            LinkCommand::Malformed { usage } => Ok(CommandOutcome::Usage { usage: *usage }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::router::VERIFY_USAGE;
    use crate::config::LinkConfig;
    use crate::db::memory::InMemoryBackend;
    use crate::link::{SignatureVerifier, personal_sign, signature::address_from_verifying_key};
    use k256::ecdsa::SigningKey;

    fn handler() -> LinkCommandHandler {
        let db = Arc::new(InMemoryBackend::new());
        let challenges = Arc::new(ChallengeService::new(db.clone(), &LinkConfig::default()));
        LinkCommandHandler::new(
            challenges.clone(),
            VerificationService::new(challenges, SignatureVerifier::default()),
            LinkPersistenceService::new(db),
        )
    }

    #[tokio::test]
    async fn connect_verify_status_disconnect() {
        let handler = handler();
        let key = SigningKey::from_slice(&[3u8; 32]).unwrap();
        let address = address_from_verifying_key(key.verifying_key()).unwrap();

        let CommandOutcome::ChallengeIssued {
            nonce,
            message,
            expires_at_ms,
        } = handler
            .handle("u1", &LinkCommand::ConnectAccount, 0)
            .await
            .unwrap()
        else {
            panic!("expected a challenge");
        };
        assert_eq!(expires_at_ms, 300_000);
        assert!(message.contains(&nonce));

        let verify = LinkCommand::Verify {
            account_id: address.clone(),
            nonce,
            signature: personal_sign(&key, &message).unwrap(),
        };
        assert_eq!(
            handler.handle("u1", &verify, 1_000).await.unwrap(),
            CommandOutcome::Linked {
                account_id: address.clone()
            }
        );
        assert_eq!(
            handler.handle("u1", &verify, 2_000).await,
            Err(LinkErrorCode::ChallengeInvalid)
        );

        assert_eq!(
            handler.handle("u1", &LinkCommand::Status, 3_000).await.unwrap(),
            CommandOutcome::Status {
                linked_account_id: Some(address)
            }
        );
        assert_eq!(
            handler
                .handle("u1", &LinkCommand::Disconnect, 4_000)
                .await
                .unwrap(),
            CommandOutcome::Disconnected
        );
        assert_eq!(
            handler.handle("u1", &LinkCommand::Disconnect, 5_000).await,
            Err(LinkErrorCode::LinkNotFound)
        );
    }

    #[tokio::test]
    async fn links_are_stored_in_canonical_form() {
        let handler = handler();
        let key = SigningKey::from_slice(&[3u8; 32]).unwrap();
        let address = address_from_verifying_key(key.verifying_key()).unwrap();

        let Ok(CommandOutcome::ChallengeIssued { nonce, message, .. }) =
            handler.handle("u1", &LinkCommand::ConnectAccount, 0).await
        else {
            panic!("expected a challenge");
        };
        let verify = LinkCommand::Verify {
            account_id: format!("0x{}", address[2..].to_ascii_uppercase()),
            nonce,
            signature: personal_sign(&key, &message).unwrap(),
        };
        assert_eq!(
            handler.handle("u1", &verify, 1).await,
            Ok(CommandOutcome::Linked {
                account_id: address.clone()
            })
        );
        assert_eq!(
            handler.handle("u1", &LinkCommand::Status, 2).await,
            Ok(CommandOutcome::Status {
                linked_account_id: Some(address)
            })
        );
    }

    #[tokio::test]
    async fn malformed_commands_echo_usage() {
        let outcome = handler()
            .handle(
                "u1",
                &LinkCommand::Malformed {
                    usage: VERIFY_USAGE,
                },
                0,
            )
            .await
            .unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "usage");
        assert_eq!(json["usage"], VERIFY_USAGE);
    }
}
