//! Integration-level exercise of the admission pipeline's ordering
//! guarantee (§8 "overload backpressure", P8): a broker over its hard
//! inflight cap, or in load-shed mode, must return OVERLOAD before it does
//! any peer-certificate or signature work. These tests drive
//! `BrokerService` directly without a live mTLS connection — exactly the
//! part of the pipeline that does not depend on a real peer certificate.

use std::sync::Arc;

use telemetry_broker::dedup::DedupIndex;
use telemetry_broker::durable_log::DurableLog;
use telemetry_broker::metrics::BrokerMetrics;
use telemetry_broker::service::BrokerService;
use telemetry_broker::trust_map::TrustMap;
use telemetry_proto::{pb, TelemetryService as _};

struct TempDb(std::path::PathBuf);

impl TempDb {
    fn new() -> Self {
        let mut p = std::env::temp_dir();
        p.push(format!(
            "telemetry-broker-admission-test-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).unwrap();
        Self(p)
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn make_service(
    max_inflight: u64,
    hard_max_inflight: u64,
    overload_mode: bool,
) -> (TempDb, BrokerService) {
    let dir = TempDb::new();
    let db = telemetry_store::open_db(&dir.0).unwrap();
    let trust_map = Arc::new(TrustMap::empty());
    let dedup = Arc::new(DedupIndex::open(&db, 300).unwrap());
    let durable_log = Arc::new(DurableLog::open(&db).unwrap());
    let metrics = Arc::new(BrokerMetrics::new());
    let service = BrokerService::new(
        trust_map,
        dedup,
        durable_log,
        metrics,
        131_072,
        max_inflight,
        hard_max_inflight,
        overload_mode,
    );
    (dir, service)
}

fn empty_flow_envelope() -> pb::Envelope {
    pb::Envelope {
        version: "v1".into(),
        ts_ns: 1,
        idempotency_key: "k1".into(),
        payload: Some(pb::envelope::Payload::Flow(pb::FlowEvent {
            src_ip: "10.0.0.1".into(),
            dst_ip: "10.0.0.2".into(),
            src_port: 1,
            dst_port: 2,
            protocol: "TCP".into(),
            bytes_sent: 1,
        })),
        sig: vec![0u8; 64],
        prev_sig: vec![],
        signing_algorithm: "Ed25519".into(),
        priority: 1,
        requires_acknowledgment: true,
    }
}

#[tokio::test]
async fn overload_mode_sheds_before_peer_check() {
    let (_dir, service) = make_service(100, 200, true);
    let request = tonic::Request::new(empty_flow_envelope());
    let ack = service.publish(request).await.unwrap().into_inner();
    assert_eq!(ack.status, pb::AckStatus::AckOverload as i32);
}

#[tokio::test]
async fn hard_inflight_cap_sheds_before_peer_check() {
    let (_dir, service) = make_service(100, 0, false);
    let request = tonic::Request::new(empty_flow_envelope());
    let ack = service.publish_telemetry(request).await.unwrap().into_inner();
    assert_eq!(ack.status, pb::AckStatus::AckOverload as i32);
}

#[tokio::test]
async fn missing_peer_certificate_is_rejected_as_unauthorized() {
    // Below both caps, so admission proceeds to the peer-authorization
    // step; a bare `tonic::Request` built in-process carries no TLS peer
    // certificates, so this exercises the "no usable peer certificate"
    // rejection path.
    let (_dir, service) = make_service(100, 200, false);
    let request = tonic::Request::new(empty_flow_envelope());
    let ack = service.publish(request).await.unwrap().into_inner();
    assert_eq!(ack.status, pb::AckStatus::AckInvalid as i32);
}
