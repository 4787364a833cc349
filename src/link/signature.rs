//! EIP-191 personal-sign recovery.

use std::sync::Arc;

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

/// Why a signature could not be turned into a signer address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature is malformed: {0}")]
    Malformed(String),

    #[error("signature recovery id must be 0/1 or 27/28, got {0}")]
    InvalidRecoveryId(u8),

    #[error("failed recovering signer from signature: {0}")]
    Recovery(String),
}

/// Recovers the address that produced `signature` over `message`.
pub trait SignatureBackend: Send + Sync {
    fn recover(&self, message: &str, signature: &str) -> Result<String, SignatureError>;
}

/// secp256k1 backend over the `\x19Ethereum Signed Message:\n<len>` prefix.
#[derive(Debug, Default, Clone, Copy)]
pub struct Eip191Backend;

impl SignatureBackend for Eip191Backend {
    fn recover(&self, message: &str, signature: &str) -> Result<String, SignatureError> {
        let bytes = decode_signature(signature)?;
        let mut sig = EcdsaSignature::try_from(&bytes[..64])
            .map_err(|e| SignatureError::Malformed(e.to_string()))?;
        let mut recovery_id = normalize_recovery_id(bytes[64])?;

        // Wallets emit low-s signatures, but accept the malleable twin too:
        // flipping s also flips the parity of the recovered point.
        if let Some(normalized) = sig.normalize_s() {
            sig = normalized;
            recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
        }

        let prehash = eip191_personal_sign_hash(message);
        let key = VerifyingKey::recover_from_prehash(&prehash, &sig, recovery_id)
            .map_err(|e| SignatureError::Recovery(e.to_string()))?;
        address_from_verifying_key(&key)
    }
}

/// Stateless facade the verification flow talks to.
#[derive(Clone)]
pub struct SignatureVerifier {
    backend: Arc<dyn SignatureBackend>,
}

impl SignatureVerifier {
    pub fn new(backend: Arc<dyn SignatureBackend>) -> Self {
        Self { backend }
    }

    /// Recover the signer of `message`, lower-cased `0x` form.
    ///
    /// `message` is hashed byte-for-byte; whitespace or line-ending drift
    /// yields a different signer.
    pub fn recover_signer(&self, message: &str, signature: &str) -> Result<String, SignatureError> {
        self.backend
            .recover(message, signature)
            .map(|address| address.to_ascii_lowercase())
    }
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::new(Arc::new(Eip191Backend))
    }
}

/// Accepts `0x` + 40 hex chars in any case and returns the lower-cased form.
pub fn normalize_account_address(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let hex = trimmed.strip_prefix("0x")?;
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}

pub fn eip191_personal_sign_hash(message: &str) -> [u8; 32] {
    let bytes = message.as_bytes();
    let prefix = format!("\x19Ethereum Signed Message:\n{}", bytes.len());
    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

pub fn address_from_verifying_key(key: &VerifyingKey) -> Result<String, SignatureError> {
    let encoded = key.to_encoded_point(false);
    let pubkey = encoded.as_bytes();
    if pubkey.len() != 65 || pubkey[0] != 0x04 {
        return Err(SignatureError::Recovery(
            "unexpected recovered public key format".to_string(),
        ));
    }
    let digest = Keccak256::digest(&pubkey[1..]);
    Ok(format!("0x{}", hex::encode(&digest[12..])))
}

/// Produce a `0x`-hex 65-byte personal-sign signature, as a wallet would.
pub fn personal_sign(key: &SigningKey, message: &str) -> Result<String, SignatureError> {
    let prehash = eip191_personal_sign_hash(message);
    let (sig, recid) = key
        .sign_prehash_recoverable(&prehash)
        .map_err(|e| SignatureError::Recovery(e.to_string()))?;
    let mut bytes = sig.to_bytes().to_vec();
    bytes.push(recid.to_byte() + 27);
    Ok(format!("0x{}", hex::encode(bytes)))
}

fn decode_signature(signature: &str) -> Result<Vec<u8>, SignatureError> {
    let trimmed = signature.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(hex_part).map_err(|e| SignatureError::Malformed(e.to_string()))?;
    if bytes.len() != 65 {
        return Err(SignatureError::Malformed(format!(
            "expected 65 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn normalize_recovery_id(raw: u8) -> Result<RecoveryId, SignatureError> {
    let id = match raw {
        27 | 28 => raw - 27,
        0 | 1 => raw,
        _ => return Err(SignatureError::InvalidRecoveryId(raw)),
    };
    RecoveryId::try_from(id).map_err(|_| SignatureError::InvalidRecoveryId(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    // Address of TEST_KEY (well-known dev account #0).
    const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    fn signing_key() -> SigningKey {
        SigningKey::from_slice(&hex::decode(TEST_KEY).unwrap()).unwrap()
    }

    #[test]
    fn derives_known_address() {
        let address = address_from_verifying_key(signing_key().verifying_key()).unwrap();
        assert_eq!(address, TEST_ADDRESS);
    }

    #[test]
    fn recovers_signer_of_personal_sign() {
        let message = "tradegate test message";
        let signature = personal_sign(&signing_key(), message).unwrap();
        let verifier = SignatureVerifier::default();
        assert_eq!(
            verifier.recover_signer(message, &signature).unwrap(),
            TEST_ADDRESS
        );
    }

    #[test]
    fn message_drift_changes_the_signer() {
        let message = "line one\nline two";
        let signature = personal_sign(&signing_key(), message).unwrap();
        let verifier = SignatureVerifier::default();

        for drifted in ["line one\r\nline two", "line one\nline two ", " line one\nline two"] {
            let recovered = verifier.recover_signer(drifted, &signature);
            assert_ne!(recovered.ok().as_deref(), Some(TEST_ADDRESS));
        }
    }

    #[test]
    fn accepts_raw_recovery_ids_and_unprefixed_hex() {
        let message = "recovery id forms";
        let signature = personal_sign(&signing_key(), message).unwrap();
        let mut bytes = hex::decode(&signature[2..]).unwrap();
        bytes[64] -= 27;
        let raw_form = hex::encode(&bytes);

        let recovered = Eip191Backend.recover(message, &raw_form).unwrap();
        assert_eq!(recovered, TEST_ADDRESS);
    }

    #[test]
    fn rejects_malformed_signatures() {
        let backend = Eip191Backend;
        assert!(matches!(
            backend.recover("m", "0xabc"),
            Err(SignatureError::Malformed(_))
        ));
        assert!(matches!(
            backend.recover("m", &format!("0x{}", "zz".repeat(65))),
            Err(SignatureError::Malformed(_))
        ));
        let mut bad_recid = "11".repeat(64);
        bad_recid.push_str("05");
        assert!(matches!(
            backend.recover("m", &bad_recid),
            Err(SignatureError::InvalidRecoveryId(5))
        ));
    }

    #[test]
    fn address_helpers() {
        assert_eq!(
            normalize_account_address("  0xF39FD6E51AAD88F6F4CE6AB8827279CFFFB92266 ").as_deref(),
            Some(TEST_ADDRESS)
        );
        assert_eq!(
            normalize_account_address("0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266").as_deref(),
            Some(TEST_ADDRESS)
        );
        assert!(normalize_account_address("0x123").is_none());
        assert!(normalize_account_address("f39fd6e51aad88f6f4ce6ab8827279cfffb92266").is_none());
    }
}
