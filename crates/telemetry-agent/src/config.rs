use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Agent Publisher configuration knobs (§4.3, §6). Mirrors the teacher's
/// `clap::Parser` derive style for node configuration.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "telemetry-agent",
    version,
    about = "Signed, backpressured telemetry publisher with a durable local WAL"
)]
pub struct AgentConfig {
    /// Any envelope larger than this is dropped with an oversize counter incremented.
    #[arg(long, default_value_t = 131_072)]
    pub max_env_bytes: usize,

    /// Token-bucket publish rate in events/sec. 0 = unbounded.
    #[arg(long, default_value_t = 0)]
    pub send_rate_eps: u32,

    /// Attempts per publish before the drain loop moves on.
    #[arg(long, default_value_t = 6)]
    pub retry_max_attempts: u32,

    /// Per-RPC deadline, in seconds.
    #[arg(long, default_value_t = 1.0)]
    pub retry_timeout_s: f64,

    /// WAL byte cap; oldest rows are dropped once exceeded.
    #[arg(long, default_value_t = telemetry_wal::DEFAULT_WAL_MAX_BYTES)]
    pub wal_max_bytes: u64,

    /// Directory for the agent's local WAL.
    #[arg(long, default_value = "./telemetry-agent-wal")]
    pub wal_path: PathBuf,

    /// Broker address, e.g. `https://broker.internal:7443`.
    #[arg(long)]
    pub broker_address: String,

    /// PEM bundle of CAs trusted to sign the broker's server certificate.
    #[arg(long)]
    pub tls_ca: PathBuf,

    /// This agent's mTLS client certificate (PEM).
    #[arg(long)]
    pub tls_client_cert: PathBuf,

    /// This agent's mTLS client private key (PEM).
    #[arg(long)]
    pub tls_client_key: PathBuf,

    /// Raw 32-byte Ed25519 signing key used for envelope signatures.
    #[arg(long)]
    pub signing_private_key_path: PathBuf,

    /// Rows pulled per drain-loop pass.
    #[arg(long, default_value_t = 500)]
    pub draining_batch_size: usize,

    /// Address for the `/healthz`, `/ready`, `/metrics` HTTP server.
    #[arg(long, default_value = "127.0.0.1:9100")]
    pub health_addr: SocketAddr,

    /// Stable identifier for this agent, used as the signing-key CN.
    #[arg(long)]
    pub agent_id: String,
}
