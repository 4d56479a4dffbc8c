use thiserror::Error;

/// Fatal startup failures. These are the only errors in the system allowed
/// to terminate a process (§7: "No error in the normal path may cause
/// process termination except those marked fatal").
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration invalid: {0}")]
    ConfigInvalid(String),

    #[error("key load failure: {0}")]
    KeyLoadFailure(String),

    #[error("durable store open failure: {0}")]
    StoreOpenFailure(String),

    #[error("TLS material failure: {0}")]
    TlsMaterialFailure(String),
}

/// Outcome of a single envelope on the agent's submit path (§4.3).
///
/// This is the typed result `submit` and the publish attempt resolve to —
/// never an opaque exception, per the Design Notes' rejection of catch-all
/// exception handling around transport.
#[derive(Debug, Error)]
pub enum AgentSubmitError {
    #[error("envelope exceeds max_env_bytes")]
    OversizePayload,

    #[error("local rate limit exceeded")]
    RateLimited,

    #[error("transient transport failure: {0}")]
    TransientTransport(String),

    #[error("broker reported overload, backoff_hint_ms={backoff_hint_ms}")]
    BrokerOverload { backoff_hint_ms: u64 },
}

/// Outcome of the broker's admission/verification pipeline (§4.4 step 2-7).
#[derive(Debug, Error)]
pub enum BrokerAdmitError {
    #[error("oversize payload")]
    OversizePayload,

    #[error("overload, backoff_hint_ms={backoff_hint_ms}")]
    Overload { backoff_hint_ms: u64 },

    #[error("bad signature")]
    SignatureInvalid,

    #[error("unauthorized peer: {0}")]
    UnauthorizedPeer(String),

    #[error("persist failure: {0}")]
    PersistFailure(String),
}
