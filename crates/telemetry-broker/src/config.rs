use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Event Broker configuration knobs (§4.4, §6).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "telemetry-broker",
    version,
    about = "Mutually-authenticated ingestion broker for signed telemetry envelopes"
)]
pub struct BrokerConfig {
    /// mTLS listen address for the gRPC service.
    #[arg(long, default_value = "0.0.0.0:7443")]
    pub listen_address: SocketAddr,

    /// This broker's server certificate (PEM).
    #[arg(long)]
    pub tls_server_cert: PathBuf,

    /// This broker's server private key (PEM).
    #[arg(long)]
    pub tls_server_key: PathBuf,

    /// CA bundle used to validate client certificates.
    #[arg(long)]
    pub tls_client_ca: PathBuf,

    /// JSON map of peer CN -> hex-encoded Ed25519 public key.
    #[arg(long)]
    pub trust_map_path: PathBuf,

    /// Any envelope larger than this is rejected `INVALID("oversize")`.
    #[arg(long, default_value_t = 131_072)]
    pub max_env_bytes: usize,

    /// Soft inflight cap; above this, `OVERLOAD` with a short backoff hint.
    #[arg(long, default_value_t = 100)]
    pub max_inflight: u64,

    /// Hard inflight cap; above this, `OVERLOAD` before signature verification.
    #[arg(long, default_value_t = 200)]
    pub hard_max_inflight: u64,

    /// Dedup TTL in seconds (§3.3 default 300).
    #[arg(long, default_value_t = 300)]
    pub dedup_ttl_s: u64,

    /// Load-shed switch: when true, every request returns `OVERLOAD`. Also
    /// readable as a boolean env override so ops can flip it without a
    /// restart-on-redeploy (§4.4).
    #[arg(long, env = "TELEMETRY_BROKER_OVERLOAD_MODE", default_value_t = false)]
    pub overload_mode: bool,

    /// Directory for the durable log and dedup index.
    #[arg(long, default_value = "./telemetry-broker-store")]
    pub durable_log_path: PathBuf,

    /// Address for the `/healthz`, `/ready`, `/metrics` HTTP server.
    #[arg(long, default_value = "127.0.0.1:9200")]
    pub health_addr: SocketAddr,
}
