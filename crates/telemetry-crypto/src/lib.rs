//! Signing / Canonicalization Library (§4.1).

pub mod canonical;
pub mod ed25519;
pub mod keys;

pub use canonical::canonical;
pub use ed25519::{sign, verify, EnvelopeSigner, SignatureError};
pub use keys::{decode_public_key_pem, load_private_key, load_public_key, KeyLoadError};
