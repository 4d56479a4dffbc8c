//! Shared, wire-independent types for the telemetry transport core.
//!
//! This crate has no networking, storage, or crypto dependencies of its
//! own — it is the vocabulary the other crates share: the envelope shape,
//! the payload union, the ack schema, and the closed error taxonomy of the
//! error-handling design (each boundary gets its own typed enum rather than
//! one catch-all).

pub mod error;
pub mod exitcode;
pub mod types;

pub use error::{AgentSubmitError, BrokerAdmitError, CoreError};
pub use types::{
    Ack, AckStatus, DeviceTelemetry, Envelope, FlowEvent, IdempotencyKey, Payload, Priority,
    ProcessEvent, SigningAlgorithm, TelemetryBatch,
};
