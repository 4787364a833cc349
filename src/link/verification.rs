//! Challenge-response verification of a claimed account.
//!
//! A linking attempt moves `issued -> verifying -> linked | rejected`.
//! Every rejection path leaves the challenge untouched; the challenge is
//! consumed only after the signature has been proven, and consumption is a
//! compare-and-set so two racing valid proofs cannot both succeed.

use std::sync::Arc;

use crate::error::LinkErrorCode;
use crate::link::challenge::ChallengeService;
use crate::link::signature::{SignatureVerifier, normalize_account_address};

pub struct VerificationService {
    challenges: Arc<ChallengeService>,
    verifier: SignatureVerifier,
}

impl VerificationService {
    pub fn new(challenges: Arc<ChallengeService>, verifier: SignatureVerifier) -> Self {
        Self {
            challenges,
            verifier,
        }
    }

    /// Prove that `identity` controls `claimed_account`.
    ///
    /// Returns the proven account, lower-cased, on success. The caller
    /// persists the link.
    pub async fn verify_link(
        &self,
        identity: &str,
        nonce: &str,
        claimed_account: &str,
        signature: &str,
        now_ms: i64,
    ) -> Result<String, LinkErrorCode> {
        let challenge = self.challenges.get_active(identity).await?;
        if !ChallengeService::is_valid(challenge.as_ref(), nonce, now_ms) {
            tracing::info!(identity, code = "CHALLENGE_INVALID", "Link verification rejected");
            return Err(LinkErrorCode::ChallengeInvalid);
        }
        let Some(challenge) = challenge else {
            return Err(LinkErrorCode::ChallengeInvalid);
        };

        let Some(claimed_account) = normalize_account_address(claimed_account) else {
            tracing::info!(
                identity,
                code = "SIGNATURE_MISMATCH",
                "Claimed account is not an address"
            );
            return Err(LinkErrorCode::SignatureMismatch);
        };

        let message = self.challenges.signing_message(&challenge);
        let signer = match self.verifier.recover_signer(&message, signature) {
            Ok(signer) => signer,
            Err(err) => {
                tracing::info!(
                    identity,
                    code = "SIGNATURE_MISMATCH",
                    error = %err,
                    "Link verification rejected"
                );
                return Err(LinkErrorCode::SignatureMismatch);
            }
        };
        if signer != claimed_account {
            tracing::info!(identity, code = "SIGNATURE_MISMATCH", "Link verification rejected");
            return Err(LinkErrorCode::SignatureMismatch);
        }

        if !self.challenges.mark_used(&challenge.nonce).await? {
            // Lost the race to a concurrent verification of the same nonce.
            tracing::info!(identity, code = "CHALLENGE_INVALID", "Link challenge already consumed");
            return Err(LinkErrorCode::ChallengeInvalid);
        }

        tracing::info!(identity, account = %signer, "Link challenge consumed");
        Ok(signer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::db::memory::InMemoryBackend;
    use crate::link::signature::{address_from_verifying_key, personal_sign};
    use k256::ecdsa::SigningKey;

    struct Fixture {
        challenges: Arc<ChallengeService>,
        service: VerificationService,
        key: SigningKey,
        address: String,
    }

    fn fixture() -> Fixture {
        let challenges = Arc::new(ChallengeService::new(
            Arc::new(InMemoryBackend::new()),
            &LinkConfig::default(),
        ));
        let service = VerificationService::new(challenges.clone(), SignatureVerifier::default());
        let key = SigningKey::from_slice(&[7u8; 32]).unwrap();
        let address = address_from_verifying_key(key.verifying_key()).unwrap();
        Fixture {
            challenges,
            service,
            key,
            address,
        }
    }

    #[tokio::test]
    async fn valid_signature_links_and_consumes() {
        let f = fixture();
        let challenge = f.challenges.issue("u1", 0).await.unwrap();
        let signature = personal_sign(&f.key, &f.challenges.signing_message(&challenge)).unwrap();

        let account = f
            .service
            .verify_link("u1", &challenge.nonce, &f.address, &signature, 299_000)
            .await
            .unwrap();
        assert_eq!(account, f.address);
        assert!(f.challenges.get_active("u1").await.unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn claimed_account_comparison_ignores_case() {
        let f = fixture();
        let challenge = f.challenges.issue("u1", 0).await.unwrap();
        let signature = personal_sign(&f.key, &f.challenges.signing_message(&challenge)).unwrap();
        let shouted = format!("0x{}", f.address[2..].to_ascii_uppercase());

        let account = f
            .service
            .verify_link("u1", &challenge.nonce, &shouted, &signature, 1)
            .await
            .unwrap();
        assert_eq!(account, f.address);
        assert_eq!(account, account.to_ascii_lowercase());
    }

    #[tokio::test]
    async fn non_address_claim_is_a_mismatch_and_keeps_challenge() {
        let f = fixture();
        let challenge = f.challenges.issue("u1", 0).await.unwrap();
        let signature = personal_sign(&f.key, &f.challenges.signing_message(&challenge)).unwrap();

        for claimed in ["alice", "0x1234", &f.address[2..]] {
            assert_eq!(
                f.service
                    .verify_link("u1", &challenge.nonce, claimed, &signature, 1)
                    .await,
                Err(LinkErrorCode::SignatureMismatch)
            );
        }
        assert!(!f.challenges.get_active("u1").await.unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn failed_signature_never_consumes() {
        let f = fixture();
        let challenge = f.challenges.issue("u1", 0).await.unwrap();
        let message = f.challenges.signing_message(&challenge);
        let other = SigningKey::from_slice(&[9u8; 32]).unwrap();
        let wrong_signer = personal_sign(&other, &message).unwrap();
        let wrong_message = personal_sign(&f.key, "some other message").unwrap();

        for signature in [wrong_signer.as_str(), wrong_message.as_str(), "0xdeadbeef", ""] {
            let result = f
                .service
                .verify_link("u1", &challenge.nonce, &f.address, signature, 1)
                .await;
            assert_eq!(result, Err(LinkErrorCode::SignatureMismatch));
            assert!(!f.challenges.get_active("u1").await.unwrap().unwrap().used);
        }

        // The legitimate holder can still complete the link.
        let good = personal_sign(&f.key, &message).unwrap();
        assert!(
            f.service
                .verify_link("u1", &challenge.nonce, &f.address, &good, 2)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn invalid_challenge_paths_do_not_mutate() {
        let f = fixture();
        let result = f
            .service
            .verify_link("nobody", "nonce", &f.address, "0x00", 0)
            .await;
        assert_eq!(result, Err(LinkErrorCode::ChallengeInvalid));

        let challenge = f.challenges.issue("u1", 0).await.unwrap();
        let signature = personal_sign(&f.key, &f.challenges.signing_message(&challenge)).unwrap();

        let wrong_nonce = f
            .service
            .verify_link("u1", "not-the-nonce", &f.address, &signature, 1)
            .await;
        assert_eq!(wrong_nonce, Err(LinkErrorCode::ChallengeInvalid));

        let expired = f
            .service
            .verify_link("u1", &challenge.nonce, &f.address, &signature, 300_001)
            .await;
        assert_eq!(expired, Err(LinkErrorCode::ChallengeInvalid));
        assert!(!f.challenges.get_active("u1").await.unwrap().unwrap().used);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_valid_proofs_consume_once() {
        let f = fixture();
        let challenge = f.challenges.issue("u1", 0).await.unwrap();
        let signature = personal_sign(&f.key, &f.challenges.signing_message(&challenge)).unwrap();
        let service = Arc::new(f.service);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            let nonce = challenge.nonce.clone();
            let address = f.address.clone();
            let signature = signature.clone();
            handles.push(tokio::spawn(async move {
                service
                    .verify_link("u1", &nonce, &address, &signature, 10)
                    .await
            }));
        }

        let mut linked = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => linked += 1,
                Err(code) => assert_eq!(code, LinkErrorCode::ChallengeInvalid),
            }
        }
        assert_eq!(linked, 1);
    }
}
