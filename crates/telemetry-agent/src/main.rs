//! telemetry-agent — the Agent Publisher binary.
//!
//! Startup sequence:
//!   1. Load the Ed25519 signing key (fatal on failure)
//!   2. Open the local WAL (fatal on failure)
//!   3. Load TLS material and connect to the broker (fatal on failure)
//!   4. Start the health/ready/metrics HTTP server
//!   5. Start the drain loop
//!   6. Mark readiness true; run until a shutdown signal

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use telemetry_agent::client::BrokerClient;
use telemetry_agent::config::AgentConfig;
use telemetry_agent::health::{self, HealthState};
use telemetry_agent::metrics::AgentMetrics;
use telemetry_agent::publisher::Publisher;
use telemetry_core::error::CoreError;
use telemetry_core::exitcode;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,telemetry=debug".parse().unwrap()),
        )
        .init();

    let config = AgentConfig::parse();
    info!(agent_id = %config.agent_id, broker = %config.broker_address, "telemetry-agent starting");

    let code = match run(config).await {
        Ok(restart_requested) => {
            if restart_requested {
                exitcode::RESTART_REQUESTED
            } else {
                exitcode::OK
            }
        }
        Err(e) => {
            error!(error = %e, "telemetry-agent exiting");
            exitcode::for_core_error(&e)
        }
    };
    std::process::exit(code);
}

async fn run(config: AgentConfig) -> Result<bool, CoreError> {
    let key_bytes = telemetry_crypto::load_private_key(&config.signing_private_key_path)
        .map_err(|e| CoreError::KeyLoadFailure(e.to_string()))?;
    let signer = Arc::new(
        telemetry_crypto::EnvelopeSigner::from_secret_key_bytes(&key_bytes)
            .map_err(|e| CoreError::KeyLoadFailure(format!("signing key rejected: {e}")))?,
    );

    let wal = Arc::new(
        telemetry_wal::Wal::open(&config.wal_path, config.wal_max_bytes)
            .map_err(|e| CoreError::StoreOpenFailure(e.to_string()))?,
    );

    let (tls_ca, client_cert, client_key) = load_tls_material(&config)
        .map_err(|e| CoreError::TlsMaterialFailure(format!("{e:#}")))?;

    let client = BrokerClient::connect(
        &config.broker_address,
        &tls_ca,
        &client_cert,
        &client_key,
        config.retry_timeout_s,
    )
    .await
    .map_err(|e| CoreError::TlsMaterialFailure(format!("connecting to broker: {e}")))?;

    let metrics = Arc::new(AgentMetrics::new());
    let health_state = HealthState::new(metrics.clone());
    let publisher = Publisher::new(config.clone(), wal, signer, client, metrics);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let health_addr = config.health_addr;
    let health_state_for_task = health_state.clone();
    let health_shutdown_rx = shutdown_rx.clone();
    tokio::spawn(async move {
        health::serve(health_addr, health_state_for_task, health_shutdown_rx).await;
    });

    let drain_publisher = publisher.clone();
    let drain_handle = tokio::spawn(drain_publisher.drain_loop(shutdown_rx.clone()));

    // readiness: key loaded, wal open, broker client connected — all true by this point.
    health_state.set_ready(true);
    info!("telemetry-agent ready");

    let restart_requested = wait_for_signal().await;

    info!("shutdown requested, stopping drain loop");
    health_state.set_ready(false);
    publisher.request_shutdown();
    let _ = shutdown_tx.send(true);
    let _ = drain_handle.await;

    Ok(restart_requested)
}

fn load_tls_material(config: &AgentConfig) -> anyhow::Result<(String, String, String)> {
    let ca = std::fs::read_to_string(&config.tls_ca)
        .with_context(|| format!("reading tls ca bundle at {}", config.tls_ca.display()))?;
    let cert = std::fs::read_to_string(&config.tls_client_cert).with_context(|| {
        format!(
            "reading tls client cert at {}",
            config.tls_client_cert.display()
        )
    })?;
    let key = std::fs::read_to_string(&config.tls_client_key).with_context(|| {
        format!(
            "reading tls client key at {}",
            config.tls_client_key.display()
        )
    })?;
    Ok((ca, cert, key))
}

/// Waits for SIGTERM/SIGINT (graceful stop) or SIGHUP (restart-requested
/// exit code, §4.3 Startup/shutdown). Returns `true` for SIGHUP.
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
