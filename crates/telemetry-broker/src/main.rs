//! telemetry-broker — the Event Broker binary.
//!
//! Startup sequence:
//!   1. Load TLS server material and the client CA bundle (fatal on failure)
//!   2. Load the CN -> public-key trust map (fatal on failure)
//!   3. Open the durable log and dedup index (fatal on failure)
//!   4. Start the health/ready/metrics HTTP server
//!   5. Start the mTLS gRPC server
//!   6. Mark readiness true; run until a shutdown signal

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use telemetry_broker::config::BrokerConfig;
use telemetry_broker::dedup::DedupIndex;
use telemetry_broker::durable_log::DurableLog;
use telemetry_broker::health::{self, HealthState};
use telemetry_broker::metrics::BrokerMetrics;
use telemetry_broker::service::BrokerService;
use telemetry_broker::trust_map::TrustMap;
use telemetry_core::error::CoreError;
use telemetry_core::exitcode;
use telemetry_proto::TelemetryServiceServer;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,telemetry=debug".parse().unwrap()),
        )
        .init();

    let config = BrokerConfig::parse();
    info!(listen = %config.listen_address, "telemetry-broker starting");

    let code = match run(config).await {
        Ok(restart_requested) => {
            if restart_requested {
                exitcode::RESTART_REQUESTED
            } else {
                exitcode::OK
            }
        }
        Err(e) => {
            error!(error = %e, "telemetry-broker exiting");
            exitcode::for_core_error(&e)
        }
    };
    std::process::exit(code);
}

async fn run(config: BrokerConfig) -> Result<bool, CoreError> {
    let tls_config = load_tls_config(&config).map_err(|e| CoreError::TlsMaterialFailure(format!("{e:#}")))?;

    let trust_map = Arc::new(
        TrustMap::load(&config.trust_map_path)
            .map_err(|e| CoreError::ConfigInvalid(format!("trust map: {e}")))?,
    );
    info!(peers = trust_map.len(), "trust map loaded");

    let db = telemetry_store::open_db(&config.durable_log_path)
        .map_err(|e| CoreError::StoreOpenFailure(e.to_string()))?;

    let dedup = Arc::new(
        DedupIndex::open(&db, config.dedup_ttl_s)
            .map_err(|e| CoreError::StoreOpenFailure(format!("dedup index: {e}")))?,
    );

    let durable_log = Arc::new(
        DurableLog::open(&db).map_err(|e| CoreError::StoreOpenFailure(format!("durable log: {e}")))?,
    );

    let metrics = Arc::new(BrokerMetrics::new());
    let health_state = HealthState::new(metrics.clone());

    let service = BrokerService::new(
        trust_map,
        dedup,
        durable_log,
        metrics,
        config.max_env_bytes,
        config.max_inflight,
        config.hard_max_inflight,
        config.overload_mode,
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let health_addr = config.health_addr;
    let health_state_for_task = health_state.clone();
    let health_shutdown_rx = shutdown_rx.clone();
    tokio::spawn(async move {
        health::serve(health_addr, health_state_for_task, health_shutdown_rx).await;
    });

    let listen_address = config.listen_address;
    let mut grpc_shutdown_rx = shutdown_rx.clone();
    let grpc_handle = tokio::spawn(async move {
        let result = Server::builder()
            .tls_config(tls_config)
            .expect("tls config accepted by tonic")
            .add_service(TelemetryServiceServer::new(service))
            .serve_with_shutdown(listen_address, async move {
                let _ = grpc_shutdown_rx.changed().await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "grpc server exited with error");
        }
    });

    health_state.set_ready(true);
    info!("telemetry-broker ready");

    let restart_requested = wait_for_signal().await;

    info!("shutdown requested, stopping grpc server");
    health_state.set_ready(false);
    let _ = shutdown_tx.send(true);
    let _ = grpc_handle.await;

    Ok(restart_requested)
}

fn load_tls_config(config: &BrokerConfig) -> anyhow::Result<ServerTlsConfig> {
    let cert = std::fs::read_to_string(&config.tls_server_cert)
        .with_context(|| format!("reading tls server cert at {}", config.tls_server_cert.display()))?;
    let key = std::fs::read_to_string(&config.tls_server_key)
        .with_context(|| format!("reading tls server key at {}", config.tls_server_key.display()))?;
    let client_ca = std::fs::read_to_string(&config.tls_client_ca)
        .with_context(|| format!("reading tls client ca bundle at {}", config.tls_client_ca.display()))?;

    Ok(ServerTlsConfig::new()
        .identity(Identity::from_pem(cert, key))
        .client_ca_root(Certificate::from_pem(client_ca)))
}

#[cfg(unix)]
async fn wait_for_signal() -> bool {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
    let mut sighup = signal(SignalKind::hangup()).expect("install SIGHUP handler");

    tokio::select! {
        _ = sigterm.recv() => { warn!("received SIGTERM"); false }
        _ = sigint.recv() => { warn!("received SIGINT"); false }
        _ = sighup.recv() => { warn!("received SIGHUP, requesting restart"); true }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> bool {
    let _ = tokio::signal::ctrl_c().await;
    false
}
