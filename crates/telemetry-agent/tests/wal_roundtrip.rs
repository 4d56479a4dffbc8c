//! End-to-end exercise of the agent's offline path (§8 "broker outage,
//! WAL replay"): sign an envelope, spill it to the WAL the way `submit`
//! does on transport failure, then read it back and verify the signature
//! the way `drain_loop` would before re-publishing. No network involved —
//! this is the part of the scenario that does not depend on the broker.

use telemetry_core::types::{Envelope, FlowEvent, IdempotencyKey, Payload, Priority, SigningAlgorithm};
use telemetry_crypto::EnvelopeSigner;
use telemetry_wal::Wal;

struct TempDir(std::path::PathBuf);

impl TempDir {
    fn new() -> Self {
        let mut p = std::env::temp_dir();
        p.push(format!(
            "telemetry-agent-wal-roundtrip-{}-{}",
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

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn sample_envelope(signer: &EnvelopeSigner, bytes_sent: u64) -> Envelope {
    let payload = Payload::Flow(FlowEvent {
        src_ip: "10.1.1.1".into(),
        dst_ip: "10.1.1.2".into(),
        src_port: 5000,
        dst_port: 443,
        protocol: "TCP".into(),
        bytes_sent,
    });
    let mut env = Envelope {
        version: "v1".into(),
        ts_ns: 1_700_000_000_000_000_000 + bytes_sent,
        idempotency_key: IdempotencyKey::new(format!("agent-001-{bytes_sent}")).unwrap(),
        payload,
        sig: Vec::new(),
        prev_sig: Vec::new(),
        signing_algorithm: SigningAlgorithm::Ed25519,
        priority: Priority::Normal,
        requires_acknowledgment: true,
    };
    let canonical = telemetry_crypto::canonical(&env);
    env.sig = signer.sign(&canonical);
    env
}

#[test]
fn spilled_envelope_survives_wal_round_trip_and_verifies() {
    let dir = TempDir::new();
    let wal = Wal::open(&dir.0, telemetry_wal::DEFAULT_WAL_MAX_BYTES).unwrap();
    let signer = EnvelopeSigner::from_secret_key_bytes(&[9u8; 32]).unwrap();

    let env = sample_envelope(&signer, 1500);
    let idem = env.idempotency_key.as_str().to_string();
    let bytes = bincode::serialize(&env).unwrap();
    wal.append(bytes, &idem, env.ts_ns).unwrap();

    let batch = wal.peek_batch(10).unwrap();
    assert_eq!(batch.len(), 1);

    let replayed: Envelope = bincode::deserialize(&batch[0].bytes).unwrap();
    let canonical = telemetry_crypto::canonical(&replayed);
    assert!(telemetry_crypto::verify(
        &signer.verifying_key_bytes(),
        &canonical,
        &replayed.sig
    ));

    wal.delete(batch[0].id).unwrap();
    assert!(wal.is_empty());
}

#[test]
fn drain_order_matches_submit_order_across_multiple_envelopes() {
    let dir = TempDir::new();
    let wal = Wal::open(&dir.0, telemetry_wal::DEFAULT_WAL_MAX_BYTES).unwrap();
    let signer = EnvelopeSigner::from_secret_key_bytes(&[3u8; 32]).unwrap();

    for n in 0..5 {
        let env = sample_envelope(&signer, n);
        let idem = env.idempotency_key.as_str().to_string();
        let bytes = bincode::serialize(&env).unwrap();
        wal.append(bytes, &idem, env.ts_ns).unwrap();
    }

    let batch = wal.peek_batch(10).unwrap();
    let bytes_sent: Vec<u64> = batch
        .iter()
        .map(|row| {
            let env: Envelope = bincode::deserialize(&row.bytes).unwrap();
            match env.payload {
                Payload::Flow(f) => f.bytes_sent,
                _ => unreachable!(),
            }
        })
        .collect();
    assert_eq!(bytes_sent, vec![0, 1, 2, 3, 4]);
}
