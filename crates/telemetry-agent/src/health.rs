//! `/healthz`, `/ready`, `/metrics` HTTP endpoints, run as a cooperating
//! task alongside the submit/drain loops rather than an ad-hoc background
//! thread (Design Notes: model background HTTP as cooperating tasks with
//! explicit shutdown signalling).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{extract::State, routing::get, Router};
use prometheus::{Encoder, TextEncoder};

use crate::metrics::AgentMetrics;

pub struct HealthState {
    pub ready: AtomicBool,
    pub metrics: Arc<AgentMetrics>,
}

impl HealthState {
    pub fn new(metrics: Arc<AgentMetrics>) -> Arc<Self> {
        Arc::new(Self {
            ready: AtomicBool::new(false),
            metrics,
        })
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn ready(State(state): State<Arc<HealthState>>) -> (axum::http::StatusCode, &'static str) {
    if state.ready.load(Ordering::SeqCst) {
        (axum::http::StatusCode::OK, "ready")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

async fn metrics(State(state): State<Arc<HealthState>>) -> String {
    let metric_families = state.metrics.registry.gather();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&metric_families, &mut buf).ok();
    String::from_utf8(buf).unwrap_or_default()
}

pub async fn serve(addr: SocketAddr, state: Arc<HealthState>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .with_state(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind health listener");
            return;
        }
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown.changed().await;
    });

    if let Err(e) = server.await {
        tracing::error!(error = %e, "health server exited with error");
    }
}
