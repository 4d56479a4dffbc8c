//! The broker's mapping from authenticated peer identity (TLS CN) to that
//! peer's Ed25519 signing public key (§4.4 `trust_map`). Read-mostly after
//! load; reload is out of scope — picking up a changed trust map requires a
//! process restart, same as the teacher's genesis params are only read once
//! at startup.
//!
//! One JSON file holds every peer, so each value is a SPKI-PEM blob decoded
//! in memory via `telemetry_crypto::decode_public_key_pem` — the same
//! decoder the SCL's own `load_public_key` uses for a single-file key,
//! adapted here to many keys in one file instead of one file per peer.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrustMapError {
    #[error("reading trust map {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing trust map {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("public key for CN {cn} failed SPKI-PEM decode: {reason}")]
    BadKeyPem { cn: String, reason: String },
}

pub struct TrustMap {
    by_cn: HashMap<String, [u8; 32]>,
}

impl TrustMap {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TrustMapError> {
        let path_ref = path.as_ref();
        let raw = std::fs::read_to_string(path_ref).map_err(|source| TrustMapError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        let parsed: HashMap<String, String> =
            serde_json::from_str(&raw).map_err(|source| TrustMapError::Json {
                path: path_ref.display().to_string(),
                source,
            })?;

        let mut by_cn = HashMap::with_capacity(parsed.len());
        for (cn, pem) in parsed {
            let key = telemetry_crypto::decode_public_key_pem(&pem).map_err(|reason| {
                TrustMapError::BadKeyPem {
                    cn: cn.clone(),
                    reason,
                }
            })?;
            by_cn.insert(cn, key);
        }
        Ok(Self { by_cn })
    }

    /// An empty trust map: every CN is unauthorized. Used by tests that
    /// only need to exercise admission steps upstream of peer lookup.
    pub fn empty() -> Self {
        Self {
            by_cn: HashMap::new(),
        }
    }

    pub fn lookup(&self, cn: &str) -> Option<&[u8; 32]> {
        self.by_cn.get(cn)
    }

    pub fn len(&self) -> usize {
        self.by_cn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_cn.is_empty()
    }
}
