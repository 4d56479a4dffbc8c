//! Deterministic, platform-independent canonical encoding of an envelope,
//! excluding `sig` and `prev_sig` (§3.2). This is a hand-written
//! field-by-field writer, not a derive-based serializer — the canonical
//! form must not depend on a library's struct-iteration or map-key order.

use telemetry_core::types::{
    DeviceTelemetry, Envelope, FlowEvent, Payload, Priority, ProcessEvent, SigningAlgorithm,
    TelemetryBatch, TelemetryItem,
};

fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn write_opt_str(buf: &mut Vec<u8>, s: &Option<String>) {
    match s {
        Some(s) => {
            buf.push(1);
            write_str(buf, s);
        }
        None => buf.push(0),
    }
}

fn write_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn write_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn write_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn write_flow(buf: &mut Vec<u8>, e: &FlowEvent) {
    write_str(buf, &e.src_ip);
    write_str(buf, &e.dst_ip);
    write_u16(buf, e.src_port);
    write_u16(buf, e.dst_port);
    write_str(buf, &e.protocol);
    write_u64(buf, e.bytes_sent);
}

fn write_process(buf: &mut Vec<u8>, e: &ProcessEvent) {
    write_u32(buf, e.pid);
    match e.ppid {
        Some(p) => {
            buf.push(1);
            write_u32(buf, p);
        }
        None => buf.push(0),
    }
    write_u32(buf, e.uid);
    write_u32(buf, e.gid);
    write_str(buf, &e.exe_path);
    write_opt_str(buf, &e.cmdline);
}

fn write_device(buf: &mut Vec<u8>, e: &DeviceTelemetry) {
    write_str(buf, &e.device_id);
    write_str(buf, &e.metric);
    write_f64(buf, e.value);
}

fn write_item(buf: &mut Vec<u8>, item: &TelemetryItem) {
    match item {
        TelemetryItem::Flow(e) => {
            buf.push(0);
            write_flow(buf, e);
        }
        TelemetryItem::Process(e) => {
            buf.push(1);
            write_process(buf, e);
        }
        TelemetryItem::Device(e) => {
            buf.push(2);
            write_device(buf, e);
        }
    }
}

fn write_batch(buf: &mut Vec<u8>, b: &TelemetryBatch) {
    write_u32(buf, b.items.len() as u32);
    for item in &b.items {
        write_item(buf, item);
    }
}

fn write_payload(buf: &mut Vec<u8>, payload: &Payload) {
    match payload {
        Payload::Flow(e) => {
            buf.push(0);
            write_flow(buf, e);
        }
        Payload::Process(e) => {
            buf.push(1);
            write_process(buf, e);
        }
        Payload::Device(e) => {
            buf.push(2);
            write_device(buf, e);
        }
        Payload::Batch(b) => {
            buf.push(3);
            write_batch(buf, b);
        }
    }
}

fn write_priority(buf: &mut Vec<u8>, p: Priority) {
    buf.push(match p {
        Priority::Low => 0,
        Priority::Normal => 1,
        Priority::High => 2,
    });
}

fn write_signing_algorithm(buf: &mut Vec<u8>, a: SigningAlgorithm) {
    buf.push(match a {
        SigningAlgorithm::Ed25519 => 0,
    });
}

/// Produces the canonical byte encoding of `env`, excluding `sig` and
/// `prev_sig` entirely (§3.2, P1). Byte-identical for the same logical
/// envelope across runs and platforms.
pub fn canonical(env: &Envelope) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    write_str(&mut buf, &env.version);
    write_u64(&mut buf, env.ts_ns);
    write_str(&mut buf, env.idempotency_key.as_str());
    write_payload(&mut buf, &env.payload);
    write_signing_algorithm(&mut buf, env.signing_algorithm);
    write_priority(&mut buf, env.priority);
    buf.push(env.requires_acknowledgment as u8);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_core::types::{Envelope, IdempotencyKey};

    fn sample() -> Envelope {
        Envelope {
            version: "v1".into(),
            ts_ns: 1_700_000_000_000_000_000,
            idempotency_key: IdempotencyKey::new("A1-ev1").unwrap(),
            payload: Payload::Flow(FlowEvent {
                src_ip: "10.0.0.1".into(),
                dst_ip: "10.0.0.2".into(),
                src_port: 1234,
                dst_port: 443,
                protocol: "TCP".into(),
                bytes_sent: 1500,
            }),
            sig: vec![],
            prev_sig: vec![],
            signing_algorithm: SigningAlgorithm::Ed25519,
            priority: Priority::Normal,
            requires_acknowledgment: true,
        }
    }

    #[test]
    fn canonical_is_deterministic_across_runs() {
        let env = sample();
        assert_eq!(canonical(&env), canonical(&env));
    }

    #[test]
    fn canonical_ignores_sig_fields() {
        let mut a = sample();
        let mut b = sample();
        a.sig = vec![1; 64];
        b.sig = vec![2; 64];
        b.prev_sig = vec![9; 64];
        assert_eq!(canonical(&a), canonical(&b));
    }

    #[test]
    fn canonical_changes_with_payload() {
        let a = sample();
        let mut b = sample();
        if let Payload::Flow(ref mut f) = b.payload {
            f.bytes_sent += 1;
        }
        assert_ne!(canonical(&a), canonical(&b));
    }
}
