//! Thin client over the generated `TelemetryServiceClient`, mirroring the
//! shape of the teacher's `WalletRpcClient`: a small wrapper that owns the
//! connection and exposes typed calls, with transport failures surfaced as
//! a dedicated error rather than bubbling up tonic's `Status` directly.

use std::time::Duration;

use telemetry_core::types::{Ack, Envelope};
use telemetry_proto::TelemetryServiceClient;
use thiserror::Error;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Identity};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("broker response could not be decoded: {0}")]
    BadResponse(String),
}

pub struct BrokerClient {
    inner: TelemetryServiceClient<Channel>,
    timeout: Duration,
}

impl BrokerClient {
    pub async fn connect(
        broker_address: &str,
        tls_ca_pem: &str,
        client_cert_pem: &str,
        client_key_pem: &str,
        retry_timeout_s: f64,
    ) -> Result<Self, ClientError> {
        let tls = ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(tls_ca_pem))
            .identity(Identity::from_pem(client_cert_pem, client_key_pem));

        let channel = Channel::from_shared(broker_address.to_string())
            .map_err(|e| ClientError::Transport(e.to_string()))?
            .tls_config(tls)
            .map_err(|e| ClientError::Transport(e.to_string()))?
            .connect()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            inner: TelemetryServiceClient::new(channel),
            timeout: Duration::from_secs_f64(retry_timeout_s),
        })
    }

    /// Calls `PublishTelemetry` with the configured per-RPC deadline
    /// (`retry_timeout_s`, §4.3). A returned `Ack` — including
    /// `AckStatus::Overload` — is a normal response, not an error; only
    /// transport-level failures (timeout, connection refused) map to
    /// [`ClientError::Transport`].
    pub async fn publish(&mut self, envelope: &Envelope) -> Result<Ack, ClientError> {
        let pb_envelope: telemetry_proto::PbEnvelope = envelope.into();
        let mut request = tonic::Request::new(pb_envelope);
        request.set_timeout(self.timeout);

        let response = self
            .inner
            .publish_telemetry(request)
            .await
            .map_err(|status| ClientError::Transport(status.to_string()))?;

        Ok(response.into_inner().into())
    }
}
