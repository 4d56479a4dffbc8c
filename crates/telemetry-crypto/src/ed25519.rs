//! Ed25519 sign/verify over canonical bytes (§4.1).

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use thiserror::Error;
use zeroize::Zeroizing;

pub const PUBLIC_KEY_LEN: usize = 32;
pub const PRIVATE_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid public key length: expected {expected}, got {got}")]
    InvalidPublicKeyLength { expected: usize, got: usize },
    #[error("invalid private key length: expected {expected}, got {got}")]
    InvalidPrivateKeyLength { expected: usize, got: usize },
}

/// Signs `canonical_bytes` with a raw 32-byte Ed25519 private key, producing
/// a fixed 64-byte detached signature.
pub fn sign(private_key: &[u8], canonical_bytes: &[u8]) -> Result<Vec<u8>, SignatureError> {
    let signer = EnvelopeSigner::from_secret_key_bytes(private_key)?;
    Ok(signer.sign(canonical_bytes))
}

/// Verifies `sig` over `canonical_bytes` under `public_key`. Returns `false`
/// on any malformed input — never raises on attacker-controlled bytes (§4.1
/// Failure). Uses `verify_strict`, which rejects non-canonical `S` scalars
/// and is constant-time with respect to the signature contents, so a bad
/// signature and a bad key are indistinguishable in timing.
pub fn verify(public_key: &[u8], canonical_bytes: &[u8], sig: &[u8]) -> bool {
    let Ok(pk_bytes) = <[u8; PUBLIC_KEY_LEN]>::try_from(public_key) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&pk_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; SIGNATURE_LEN]>::try_from(sig) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key.verify_strict(canonical_bytes, &signature).is_ok()
}

/// Holds a signing key with zeroize-on-drop hygiene, used by the agent
/// publisher to sign every outgoing envelope.
pub struct EnvelopeSigner {
    signing_key: SigningKey,
    secret_bytes: Zeroizing<[u8; PRIVATE_KEY_LEN]>,
}

impl EnvelopeSigner {
    pub fn from_secret_key_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        let arr: [u8; PRIVATE_KEY_LEN] =
            bytes
                .try_into()
                .map_err(|_| SignatureError::InvalidPrivateKeyLength {
                    expected: PRIVATE_KEY_LEN,
                    got: bytes.len(),
                })?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&arr),
            secret_bytes: Zeroizing::new(arr),
        })
    }

    pub fn sign(&self, canonical_bytes: &[u8]) -> Vec<u8> {
        self.signing_key.sign(canonical_bytes).to_bytes().to_vec()
    }

    pub fn verifying_key_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.signing_key.verifying_key().to_bytes()
    }
}

impl std::fmt::Debug for EnvelopeSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeSigner")
            .field("verifying_key", &hex::encode(self.verifying_key_bytes()))
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

// secret_bytes zeroizes itself via `Zeroizing` on drop; `signing_key` holds
// its own copy internally and dalek zeroizes that on drop too.

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> ([u8; PRIVATE_KEY_LEN], [u8; PUBLIC_KEY_LEN]) {
        let sk_bytes = [7u8; PRIVATE_KEY_LEN];
        let signer = EnvelopeSigner::from_secret_key_bytes(&sk_bytes).unwrap();
        (sk_bytes, signer.verifying_key_bytes())
    }

    #[test]
    fn sign_verify_round_trip() {
        let (sk, pk) = keypair();
        let msg = b"canonical bytes go here";
        let sig = sign(&sk, msg).unwrap();
        assert!(verify(&pk, msg, &sig));
    }

    #[test]
    fn tampered_message_fails() {
        let (sk, pk) = keypair();
        let msg = b"canonical bytes go here";
        let sig = sign(&sk, msg).unwrap();
        assert!(!verify(&pk, b"canonical bytes go HERE", &sig));
    }

    #[test]
    fn malformed_public_key_never_panics() {
        let sig = vec![0u8; SIGNATURE_LEN];
        assert!(!verify(&[1, 2, 3], b"x", &sig));
    }

    #[test]
    fn malformed_signature_never_panics() {
        let (_, pk) = keypair();
        assert!(!verify(&pk, b"x", &[0u8; 3]));
    }
}
