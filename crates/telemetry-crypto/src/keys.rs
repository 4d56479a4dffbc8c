//! Key loading for the SCL (§4.1): raw 32-byte private key files, SPKI-PEM
//! public key material. Both fail closed on format or length mismatch —
//! never silently fall back to a default key.
//!
//! `decode_public_key_pem` is split out from `load_public_key` so a single
//! PEM-keyed trust map (one file, many peers — see `telemetry-broker`'s
//! `trust_map` module) can decode each entry's PEM value without a
//! per-peer file on disk; `load_public_key` stays as the direct,
//! single-file form the SCL operation list describes.

use std::path::Path;

use ed25519_dalek::pkcs8::DecodePublicKey;
use ed25519_dalek::VerifyingKey;
use thiserror::Error;

use crate::ed25519::{PRIVATE_KEY_LEN, PUBLIC_KEY_LEN};

#[derive(Debug, Error)]
pub enum KeyLoadError {
    #[error("reading key file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("private key at {path} is {got} bytes, expected {expected}")]
    BadPrivateKeyLength {
        path: String,
        expected: usize,
        got: usize,
    },
    #[error("public key at {path} failed SPKI-PEM decode: {reason}")]
    BadPublicKeyPem { path: String, reason: String },
}

/// Loads a raw 32-byte Ed25519 private key from `path`.
pub fn load_private_key(path: impl AsRef<Path>) -> Result<[u8; PRIVATE_KEY_LEN], KeyLoadError> {
    let path_ref = path.as_ref();
    let bytes = std::fs::read(path_ref).map_err(|source| KeyLoadError::Io {
        path: path_ref.display().to_string(),
        source,
    })?;
    let arr: [u8; PRIVATE_KEY_LEN] =
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyLoadError::BadPrivateKeyLength {
                path: path_ref.display().to_string(),
                expected: PRIVATE_KEY_LEN,
                got: bytes.len(),
            })?;
    Ok(arr)
}

/// Loads a SPKI-PEM encoded Ed25519 public key from `path`.
pub fn load_public_key(path: impl AsRef<Path>) -> Result<[u8; PUBLIC_KEY_LEN], KeyLoadError> {
    let path_ref = path.as_ref();
    let pem = std::fs::read_to_string(path_ref).map_err(|source| KeyLoadError::Io {
        path: path_ref.display().to_string(),
        source,
    })?;
    decode_public_key_pem(&pem).map_err(|reason| KeyLoadError::BadPublicKeyPem {
        path: path_ref.display().to_string(),
        reason,
    })
}

/// Decodes a SPKI-PEM blob already held in memory, e.g. one value out of a
/// CN-keyed trust map file rather than its own standalone file.
pub fn decode_public_key_pem(pem: &str) -> Result<[u8; PUBLIC_KEY_LEN], String> {
    VerifyingKey::from_public_key_pem(pem)
        .map(|vk| vk.to_bytes())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(label: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("telemetry-crypto-test-{label}-{}", std::process::id()))
    }

    #[test]
    fn loads_a_well_formed_private_key() {
        let path = temp_path("priv-ok");
        std::fs::write(&path, [7u8; PRIVATE_KEY_LEN]).unwrap();
        let key = load_private_key(&path).unwrap();
        assert_eq!(key, [7u8; PRIVATE_KEY_LEN]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn rejects_wrong_length_private_key() {
        let path = temp_path("priv-short");
        std::fs::write(&path, [7u8; PRIVATE_KEY_LEN - 1]).unwrap();
        let err = load_private_key(&path).unwrap_err();
        assert!(matches!(err, KeyLoadError::BadPrivateKeyLength { .. }));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn rejects_missing_private_key_file() {
        let err = load_private_key("/nonexistent/path/to/key").unwrap_err();
        assert!(matches!(err, KeyLoadError::Io { .. }));
    }

    fn sample_public_key_pem() -> String {
        use crate::ed25519::EnvelopeSigner;
        use ed25519_dalek::pkcs8::EncodePublicKey;

        let signer = EnvelopeSigner::from_secret_key_bytes(&[9u8; PRIVATE_KEY_LEN]).unwrap();
        let verifying_key =
            ed25519_dalek::VerifyingKey::from_bytes(&signer.verifying_key_bytes()).unwrap();
        verifying_key
            .to_public_key_pem(Default::default())
            .unwrap()
    }

    #[test]
    fn decodes_a_well_formed_public_key_pem() {
        let pem = sample_public_key_pem();
        let decoded = decode_public_key_pem(&pem).unwrap();
        let signer = crate::ed25519::EnvelopeSigner::from_secret_key_bytes(&[9u8; PRIVATE_KEY_LEN])
            .unwrap();
        assert_eq!(decoded, signer.verifying_key_bytes());
    }

    #[test]
    fn rejects_malformed_public_key_pem() {
        assert!(decode_public_key_pem("not a pem").is_err());
    }

    #[test]
    fn load_public_key_round_trips_through_a_file() {
        let path = temp_path("pub-ok");
        std::fs::write(&path, sample_public_key_pem()).unwrap();
        let decoded = load_public_key(&path).unwrap();
        let signer = crate::ed25519::EnvelopeSigner::from_secret_key_bytes(&[9u8; PRIVATE_KEY_LEN])
            .unwrap();
        assert_eq!(decoded, signer.verifying_key_bytes());
        let _ = std::fs::remove_file(&path);
    }
}
