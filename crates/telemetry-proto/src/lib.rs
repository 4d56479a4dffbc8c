//! Generated gRPC/protobuf types for the telemetry wire schema, plus
//! conversions to and from `telemetry-core`'s wire-independent types.

pub mod pb {
    tonic::include_proto!("telemetry");
}

mod convert;

pub use convert::ConversionError;
pub use pb::telemetry_service_client::TelemetryServiceClient;
pub use pb::telemetry_service_server::{TelemetryService, TelemetryServiceServer};
pub use pb::{Ack, AckStatus, Envelope as PbEnvelope, Priority as PbPriority};
