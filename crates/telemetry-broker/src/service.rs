//! The broker's gRPC surface: one `TelemetryService` impl running the
//! admission/verify/dedup/persist pipeline of §4.4 step by step.
//!
//! Ordering follows P8 literally: the inflight hard-cap check happens before
//! any CN extraction or signature verification, so an attacker flooding an
//! overloaded broker never gets a single signature checked, let alone
//! verified, on their behalf. Soft-cap overload (admitted normally but
//! flagged) is checked after peer authorization, since it is advisory
//! rather than a security boundary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use telemetry_core::error::BrokerAdmitError;
use telemetry_core::types::{Ack, Envelope};
use telemetry_proto::{pb, PbEnvelope, TelemetryService};
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use crate::cert::extract_common_name;
use crate::dedup::DedupIndex;
use crate::durable_log::DurableLog;
use crate::metrics::BrokerMetrics;
use crate::trust_map::TrustMap;

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Uniform sample over `[lo_ms, hi_ms)`, the named backoff windows of §4.4
/// step 4 (hard-cap/overload_mode: 500-1500ms, soft-cap: 100-300ms).
fn jittered_hint_ms(lo_ms: u64, hi_ms: u64) -> u64 {
    rand::thread_rng().gen_range(lo_ms..hi_ms)
}

/// RAII inflight counter: increments on creation, decrements on drop so a
/// request that errors out, panics, or returns early never leaks a slot.
struct InflightGuard<'a> {
    inflight: &'a AtomicU64,
}

impl<'a> InflightGuard<'a> {
    fn enter(inflight: &'a AtomicU64) -> (Self, u64) {
        let current = inflight.fetch_add(1, Ordering::SeqCst) + 1;
        (Self { inflight }, current)
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.inflight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct BrokerService {
    trust_map: Arc<TrustMap>,
    dedup: Arc<DedupIndex>,
    durable_log: Arc<DurableLog>,
    metrics: Arc<BrokerMetrics>,
    max_env_bytes: usize,
    max_inflight: u64,
    hard_max_inflight: u64,
    overload_mode: bool,
    inflight: AtomicU64,
}

impl BrokerService {
    pub fn new(
        trust_map: Arc<TrustMap>,
        dedup: Arc<DedupIndex>,
        durable_log: Arc<DurableLog>,
        metrics: Arc<BrokerMetrics>,
        max_env_bytes: usize,
        max_inflight: u64,
        hard_max_inflight: u64,
        overload_mode: bool,
    ) -> Self {
        Self {
            trust_map,
            dedup,
            durable_log,
            metrics,
            max_env_bytes,
            max_inflight,
            hard_max_inflight,
            overload_mode,
            inflight: AtomicU64::new(0),
        }
    }

    async fn admit(&self, request: Request<PbEnvelope>) -> Ack {
        match self.try_admit(request).await {
            Ok(ack) => ack,
            Err(err) => self.ack_for_admit_error(err),
        }
    }

    /// Runs the 8-step pipeline of §4.4, returning either a success `Ack`
    /// (OK or duplicate-OK) or the typed reason admission stopped.
    async fn try_admit(&self, request: Request<PbEnvelope>) -> Result<Ack, BrokerAdmitError> {
        // Step 1: hard admission, before any per-peer work (P8).
        let (_guard, inflight_now) = InflightGuard::enter(&self.inflight);
        self.metrics.inflight.set(inflight_now as i64);

        if self.overload_mode || inflight_now > self.hard_max_inflight {
            warn!(inflight_now, "hard inflight cap exceeded, shedding before verification");
            return Err(BrokerAdmitError::Overload {
                backoff_hint_ms: jittered_hint_ms(500, 1500),
            });
        }

        // Step 2: peer authorization via TLS-layer CN.
        let der_chain = request
            .peer_certs()
            .map(|certs| certs.iter().map(|c| c.clone().into_inner()).collect::<Vec<_>>())
            .unwrap_or_default();

        let cn = extract_common_name(&der_chain).map_err(|e| {
            warn!(error = %e, "rejecting request with no usable peer certificate");
            BrokerAdmitError::UnauthorizedPeer(e.to_string())
        })?;

        let public_key = self.trust_map.lookup(&cn).ok_or_else(|| {
            warn!(cn = %cn, "rejecting request from CN absent in trust map");
            BrokerAdmitError::UnauthorizedPeer(cn.clone())
        })?;

        let pb_env = request.into_inner();

        // Step 3: size check.
        if prost::Message::encoded_len(&pb_env) > self.max_env_bytes {
            return Err(BrokerAdmitError::OversizePayload);
        }

        // Step 4: soft admission.
        if inflight_now > self.max_inflight {
            return Err(BrokerAdmitError::Overload {
                backoff_hint_ms: jittered_hint_ms(100, 300),
            });
        }

        // Step 5: decode into the core envelope.
        let env: Envelope = pb_env.try_into().map_err(|e: telemetry_proto::ConversionError| {
            warn!(cn = %cn, error = %e, "malformed envelope");
            BrokerAdmitError::SignatureInvalid
        })?;

        // Step 6: signature verification over the canonical encoding.
        let canonical_bytes = telemetry_crypto::canonical(&env);
        if !telemetry_crypto::verify(public_key, &canonical_bytes, &env.sig) {
            warn!(cn = %cn, "signature verification failed");
            return Err(BrokerAdmitError::SignatureInvalid);
        }

        // Step 7: dedup.
        let now = now_ns();
        let idem = env.idempotency_key.as_str().to_string();
        let is_duplicate = self.dedup.check_and_insert(&idem, now).map_err(|e| {
            warn!(error = %e, "dedup index lookup failed");
            BrokerAdmitError::PersistFailure(e.to_string())
        })?;
        if is_duplicate {
            self.metrics.duplicate_total.inc();
            return Ok(Ack::ok(true, now));
        }

        // Step 8: durable append.
        let encoded = bincode::serialize(&env)
            .map_err(|e| BrokerAdmitError::PersistFailure(format!("encode failure: {e}")))?;
        self.durable_log.append(&idem, env.ts_ns, encoded).map_err(|e| {
            warn!(error = %e, "durable append failed");
            BrokerAdmitError::PersistFailure(e.to_string())
        })?;

        self.metrics.accepted_total.inc();
        info!(cn = %cn, idem = %idem, "envelope accepted");
        Ok(Ack::ok(false, now))
    }

    /// Maps a pipeline rejection to its wire `Ack` and increments the
    /// counter matching §7's error table.
    fn ack_for_admit_error(&self, err: BrokerAdmitError) -> Ack {
        match err {
            BrokerAdmitError::OversizePayload => {
                self.metrics.dropped_oversize_total.inc();
                Ack::invalid("oversize payload")
            }
            BrokerAdmitError::Overload { backoff_hint_ms } => {
                self.metrics.overload_total.inc();
                Ack::overload("broker overloaded", backoff_hint_ms)
            }
            BrokerAdmitError::SignatureInvalid => {
                self.metrics.signature_invalid_total.inc();
                Ack::invalid("signature verification failed")
            }
            BrokerAdmitError::UnauthorizedPeer(reason) => {
                self.metrics.unauthorized_peer_total.inc();
                Ack::invalid(format!("unauthorized peer: {reason}"))
            }
            BrokerAdmitError::PersistFailure(reason) => {
                // Persist-adjacent failure: OVERLOAD rather than INVALID, so
                // agents retry instead of discarding a signed envelope that
                // was never actually rejected for cause (§9 Open Questions).
                self.metrics.persist_failed_total.inc();
                Ack::overload(
                    format!("persist failure: {reason}"),
                    jittered_hint_ms(500, 1500),
                )
            }
        }
    }
}

#[tonic::async_trait]
impl TelemetryService for BrokerService {
    async fn publish(
        &self,
        request: Request<PbEnvelope>,
    ) -> Result<Response<pb::Ack>, Status> {
        let ack = self.admit(request).await;
        Ok(Response::new((&ack).into()))
    }

    async fn publish_telemetry(
        &self,
        request: Request<PbEnvelope>,
    ) -> Result<Response<pb::Ack>, Status> {
        let ack = self.admit(request).await;
        Ok(Response::new((&ack).into()))
    }
}
