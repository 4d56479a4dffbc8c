use telemetry_core::types as core;
use thiserror::Error;

use crate::pb;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("envelope is missing its payload")]
    MissingPayload,
    #[error("telemetry item is missing its payload")]
    MissingItem,
    #[error("invalid idempotency_key: {0}")]
    InvalidIdempotencyKey(String),
    #[error("unknown signing_algorithm: {0}")]
    UnknownSigningAlgorithm(String),
}

fn flow_to_pb(e: &core::FlowEvent) -> pb::FlowEvent {
    pb::FlowEvent {
        src_ip: e.src_ip.clone(),
        dst_ip: e.dst_ip.clone(),
        src_port: e.src_port as u32,
        dst_port: e.dst_port as u32,
        protocol: e.protocol.clone(),
        bytes_sent: e.bytes_sent,
    }
}

fn flow_from_pb(e: pb::FlowEvent) -> core::FlowEvent {
    core::FlowEvent {
        src_ip: e.src_ip,
        dst_ip: e.dst_ip,
        src_port: e.src_port as u16,
        dst_port: e.dst_port as u16,
        protocol: e.protocol,
        bytes_sent: e.bytes_sent,
    }
}

fn process_to_pb(e: &core::ProcessEvent) -> pb::ProcessEvent {
    pb::ProcessEvent {
        pid: e.pid,
        ppid: e.ppid,
        uid: e.uid,
        gid: e.gid,
        exe_path: e.exe_path.clone(),
        cmdline: e.cmdline.clone(),
    }
}

fn process_from_pb(e: pb::ProcessEvent) -> core::ProcessEvent {
    core::ProcessEvent {
        pid: e.pid,
        ppid: e.ppid,
        uid: e.uid,
        gid: e.gid,
        exe_path: e.exe_path,
        cmdline: e.cmdline,
    }
}

fn device_to_pb(e: &core::DeviceTelemetry) -> pb::DeviceTelemetry {
    pb::DeviceTelemetry {
        device_id: e.device_id.clone(),
        metric: e.metric.clone(),
        value: e.value,
    }
}

fn device_from_pb(e: pb::DeviceTelemetry) -> core::DeviceTelemetry {
    core::DeviceTelemetry {
        device_id: e.device_id,
        metric: e.metric,
        value: e.value,
    }
}

fn item_to_pb(item: &core::TelemetryItem) -> pb::TelemetryItem {
    use pb::telemetry_item::Item;
    let item = match item {
        core::TelemetryItem::Flow(e) => Item::Flow(flow_to_pb(e)),
        core::TelemetryItem::Process(e) => Item::Process(process_to_pb(e)),
        core::TelemetryItem::Device(e) => Item::Device(device_to_pb(e)),
    };
    pb::TelemetryItem { item: Some(item) }
}

fn item_from_pb(item: pb::TelemetryItem) -> Result<core::TelemetryItem, ConversionError> {
    use pb::telemetry_item::Item;
    match item.item.ok_or(ConversionError::MissingItem)? {
        Item::Flow(e) => Ok(core::TelemetryItem::Flow(flow_from_pb(e))),
        Item::Process(e) => Ok(core::TelemetryItem::Process(process_from_pb(e))),
        Item::Device(e) => Ok(core::TelemetryItem::Device(device_from_pb(e))),
    }
}

fn priority_to_pb(p: core::Priority) -> i32 {
    match p {
        core::Priority::Low => pb::Priority::Low as i32,
        core::Priority::Normal => pb::Priority::Normal as i32,
        core::Priority::High => pb::Priority::High as i32,
    }
}

fn priority_from_pb(p: i32) -> core::Priority {
    match pb::Priority::try_from(p).unwrap_or(pb::Priority::Normal) {
        pb::Priority::Low => core::Priority::Low,
        pb::Priority::Normal => core::Priority::Normal,
        pb::Priority::High => core::Priority::High,
    }
}

impl From<&core::Envelope> for pb::Envelope {
    fn from(env: &core::Envelope) -> Self {
        use pb::envelope::Payload as PbPayload;
        let payload = match &env.payload {
            core::Payload::Flow(e) => PbPayload::Flow(flow_to_pb(e)),
            core::Payload::Process(e) => PbPayload::Process(process_to_pb(e)),
            core::Payload::Device(e) => PbPayload::Device(device_to_pb(e)),
            core::Payload::Batch(b) => PbPayload::Batch(pb::TelemetryBatch {
                items: b.items.iter().map(item_to_pb).collect(),
            }),
        };
        pb::Envelope {
            version: env.version.clone(),
            ts_ns: env.ts_ns,
            idempotency_key: env.idempotency_key.as_str().to_string(),
            payload: Some(payload),
            sig: env.sig.clone(),
            prev_sig: env.prev_sig.clone(),
            signing_algorithm: env.signing_algorithm.to_string(),
            priority: priority_to_pb(env.priority),
            requires_acknowledgment: env.requires_acknowledgment,
        }
    }
}

impl TryFrom<pb::Envelope> for core::Envelope {
    type Error = ConversionError;

    fn try_from(env: pb::Envelope) -> Result<Self, Self::Error> {
        use pb::envelope::Payload as PbPayload;
        let payload = match env.payload.ok_or(ConversionError::MissingPayload)? {
            PbPayload::Flow(e) => core::Payload::Flow(flow_from_pb(e)),
            PbPayload::Process(e) => core::Payload::Process(process_from_pb(e)),
            PbPayload::Device(e) => core::Payload::Device(device_from_pb(e)),
            PbPayload::Batch(b) => {
                let items = b
                    .items
                    .into_iter()
                    .map(item_from_pb)
                    .collect::<Result<Vec<_>, _>>()?;
                core::Payload::Batch(core::TelemetryBatch { items })
            }
        };
        let idempotency_key = core::IdempotencyKey::new(env.idempotency_key)
            .map_err(ConversionError::InvalidIdempotencyKey)?;
        let signing_algorithm = match env.signing_algorithm.as_str() {
            "Ed25519" => core::SigningAlgorithm::Ed25519,
            other => return Err(ConversionError::UnknownSigningAlgorithm(other.to_string())),
        };
        Ok(core::Envelope {
            version: env.version,
            ts_ns: env.ts_ns,
            idempotency_key,
            payload,
            sig: env.sig,
            prev_sig: env.prev_sig,
            signing_algorithm,
            priority: priority_from_pb(env.priority),
            requires_acknowledgment: env.requires_acknowledgment,
        })
    }
}

impl From<&core::Ack> for pb::Ack {
    fn from(ack: &core::Ack) -> Self {
        let status = match ack.status {
            core::AckStatus::Ok => pb::AckStatus::AckOk,
            core::AckStatus::Overload => pb::AckStatus::AckOverload,
            core::AckStatus::Invalid => pb::AckStatus::AckInvalid,
        };
        pb::Ack {
            status: status as i32,
            reason: ack.reason.clone(),
            backoff_hint_ms: ack.backoff_hint_ms,
            duplicate: ack.duplicate,
            processed_ts_ns: ack.processed_ts_ns,
        }
    }
}

impl From<pb::Ack> for core::Ack {
    fn from(ack: pb::Ack) -> Self {
        let status = match pb::AckStatus::try_from(ack.status).unwrap_or(pb::AckStatus::AckInvalid) {
            pb::AckStatus::AckOk => core::AckStatus::Ok,
            pb::AckStatus::AckOverload => core::AckStatus::Overload,
            pb::AckStatus::AckInvalid => core::AckStatus::Invalid,
        };
        core::Ack {
            status,
            reason: ack.reason,
            backoff_hint_ms: ack.backoff_hint_ms,
            duplicate: ack.duplicate,
            processed_ts_ns: ack.processed_ts_ns,
        }
    }
}
