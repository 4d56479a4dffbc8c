//! Idempotency key derivation (§3.3): opaque to the broker, but producers
//! must compute it as a stable hash of identifying fields so retries of the
//! same logical event collide on the same key.

use blake2::{Blake2b512, Digest};
use telemetry_core::types::{Payload, TelemetryItem};

fn hash_fields(fields: &[&[u8]]) -> String {
    let mut hasher = Blake2b512::new();
    for f in fields {
        hasher.update((f.len() as u32).to_be_bytes());
        hasher.update(f);
    }
    hex::encode(&hasher.finalize()[..16])
}

fn item_identity(item: &TelemetryItem) -> Vec<Vec<u8>> {
    match item {
        TelemetryItem::Flow(e) => vec![
            e.src_ip.as_bytes().to_vec(),
            e.dst_ip.as_bytes().to_vec(),
            e.src_port.to_be_bytes().to_vec(),
            e.dst_port.to_be_bytes().to_vec(),
            e.protocol.as_bytes().to_vec(),
        ],
        TelemetryItem::Process(e) => vec![e.pid.to_be_bytes().to_vec(), e.exe_path.as_bytes().to_vec()],
        TelemetryItem::Device(e) => vec![e.device_id.as_bytes().to_vec(), e.metric.as_bytes().to_vec()],
    }
}

/// Derives a stable idempotency key from `ts_ns` plus event-type-specific
/// identifying fields (flow tuple, device id, process identity).
pub fn derive(agent_id: &str, ts_ns: u64, payload: &Payload) -> String {
    let ts_bytes = ts_ns.to_be_bytes();
    let mut fields: Vec<Vec<u8>> = vec![agent_id.as_bytes().to_vec(), ts_bytes.to_vec()];
    match payload {
        Payload::Flow(e) => fields.extend(item_identity(&TelemetryItem::Flow(e.clone()))),
        Payload::Process(e) => fields.extend(item_identity(&TelemetryItem::Process(e.clone()))),
        Payload::Device(e) => fields.extend(item_identity(&TelemetryItem::Device(e.clone()))),
        Payload::Batch(b) => {
            for item in &b.items {
                fields.extend(item_identity(item));
            }
        }
    }
    let refs: Vec<&[u8]> = fields.iter().map(|f| f.as_slice()).collect();
    hash_fields(&refs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_core::types::FlowEvent;

    #[test]
    fn same_fields_yield_same_key() {
        let payload = Payload::Flow(FlowEvent {
            src_ip: "10.0.0.1".into(),
            dst_ip: "10.0.0.2".into(),
            src_port: 1234,
            dst_port: 443,
            protocol: "TCP".into(),
            bytes_sent: 1500,
        });
        let a = derive("A1", 1_700_000_000_000_000_000, &payload);
        let b = derive("A1", 1_700_000_000_000_000_000, &payload);
        assert_eq!(a, b);
    }

    #[test]
    fn different_timestamp_yields_different_key() {
        let payload = Payload::Flow(FlowEvent {
            src_ip: "10.0.0.1".into(),
            dst_ip: "10.0.0.2".into(),
            src_port: 1234,
            dst_port: 443,
            protocol: "TCP".into(),
            bytes_sent: 1500,
        });
        let a = derive("A1", 1, &payload);
        let b = derive("A1", 2, &payload);
        assert_ne!(a, b);
    }
}
