use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of an idempotency key in bytes (§3.1).
pub const MAX_IDEMPOTENCY_KEY_BYTES: usize = 128;

/// Producer-assigned opaque identifier the broker uses to suppress
/// duplicates within `dedup_ttl_s` (§3.3). Opaque to the broker: producers
/// choose the hashing scheme, this type only enforces the length bound.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Builds a key, rejecting anything over [`MAX_IDEMPOTENCY_KEY_BYTES`].
    pub fn new(raw: impl Into<String>) -> Result<Self, String> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err("idempotency_key must not be empty".into());
        }
        if raw.len() > MAX_IDEMPOTENCY_KEY_BYTES {
            return Err(format!(
                "idempotency_key is {} bytes, exceeds {}",
                raw.len(),
                MAX_IDEMPOTENCY_KEY_BYTES
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdempotencyKey({})", self.0)
    }
}

/// Advisory priority; affects admission ordering under pressure but never
/// bypasses the hard caps (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Must be `"Ed25519"` per §3.1; kept as an enum of one so future schemes
/// are additive rather than a silent string compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    Ed25519,
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningAlgorithm::Ed25519 => f.write_str("Ed25519"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEvent {
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: String,
    pub bytes_sent: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEvent {
    pub pid: u32,
    pub ppid: Option<u32>,
    pub uid: u32,
    pub gid: u32,
    pub exe_path: String,
    pub cmdline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceTelemetry {
    pub device_id: String,
    pub metric: String,
    pub value: f64,
}

/// Non-batch telemetry item, the element type of [`TelemetryBatch`]. Kept
/// separate from [`Payload`] so a batch cannot nest another batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryItem {
    Flow(FlowEvent),
    Process(ProcessEvent),
    Device(DeviceTelemetry),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryBatch {
    pub items: Vec<TelemetryItem>,
}

/// The telemetry body: a tagged union of exactly one variant (§3.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Flow(FlowEvent),
    Process(ProcessEvent),
    Device(DeviceTelemetry),
    Batch(TelemetryBatch),
}

/// The unit of transport (§3.1). `sig`/`prev_sig` are excluded from the
/// canonical encoding that `telemetry-crypto` signs and verifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub version: String,
    pub ts_ns: u64,
    pub idempotency_key: IdempotencyKey,
    pub payload: Payload,
    /// Detached signature, fixed 64 bytes once signed; empty before signing.
    pub sig: Vec<u8>,
    /// `sig` of this producer's previous envelope; empty for the first one.
    pub prev_sig: Vec<u8>,
    pub signing_algorithm: SigningAlgorithm,
    pub priority: Priority,
    pub requires_acknowledgment: bool,
}

impl Envelope {
    pub fn serialized_len(&self) -> usize {
        bincode_len_estimate(self)
    }
}

/// Cheap upper-bound size estimate without requiring a serializer dependency
/// in this crate; actual on-wire length is computed by `telemetry-proto`.
fn bincode_len_estimate(env: &Envelope) -> usize {
    // version + idem + sig + prev_sig as literal bytes, plus a fixed
    // overhead allowance for the payload and framing. Callers that need an
    // exact length use the encoded proto bytes directly.
    env.version.len()
        + env.idempotency_key.as_str().len()
        + env.sig.len()
        + env.prev_sig.len()
        + 256
}

/// Status returned by the broker for a `Publish`/`PublishTelemetry` call (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckStatus {
    Ok,
    Overload,
    Invalid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub status: AckStatus,
    pub reason: String,
    pub backoff_hint_ms: u64,
    pub duplicate: bool,
    pub processed_ts_ns: Option<u64>,
}

impl Ack {
    pub fn ok(duplicate: bool, processed_ts_ns: u64) -> Self {
        Self {
            status: AckStatus::Ok,
            reason: String::new(),
            backoff_hint_ms: 0,
            duplicate,
            processed_ts_ns: Some(processed_ts_ns),
        }
    }

    pub fn overload(reason: impl Into<String>, backoff_hint_ms: u64) -> Self {
        Self {
            status: AckStatus::Overload,
            reason: reason.into(),
            backoff_hint_ms,
            duplicate: false,
            processed_ts_ns: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Invalid,
            reason: reason.into(),
            backoff_hint_ms: 0,
            duplicate: false,
            processed_ts_ns: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_rejects_oversize() {
        let too_long = "x".repeat(MAX_IDEMPOTENCY_KEY_BYTES + 1);
        assert!(IdempotencyKey::new(too_long).is_err());
    }

    #[test]
    fn idempotency_key_accepts_boundary() {
        let exact = "x".repeat(MAX_IDEMPOTENCY_KEY_BYTES);
        assert!(IdempotencyKey::new(exact).is_ok());
    }

    #[test]
    fn idempotency_key_rejects_empty() {
        assert!(IdempotencyKey::new("").is_err());
    }
}
