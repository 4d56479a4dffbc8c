//! Peer identity extraction from the client certificate tonic hands back on
//! an mTLS connection (§4.4, §6: "peer CN is used for authorization and
//! signing-key lookup"). tonic/rustls only expose the raw DER chain, so the
//! CN has to be parsed out ourselves.

use thiserror::Error;
use x509_parser::prelude::{FromDer, X509Certificate};

#[derive(Debug, Error)]
pub enum CertError {
    #[error("no peer certificate presented")]
    Missing,
    #[error("failed to parse peer certificate: {0}")]
    Parse(String),
    #[error("peer certificate has no CN in its subject")]
    NoCommonName,
}

/// Extracts the leaf certificate's subject Common Name from the DER chain
/// tonic's `Request::peer_certs()` returns. The leaf is conventionally the
/// first certificate in the chain.
pub fn extract_common_name(der_chain: &[Vec<u8>]) -> Result<String, CertError> {
    let leaf = der_chain.first().ok_or(CertError::Missing)?;
    let (_, cert) =
        X509Certificate::from_der(leaf).map_err(|e| CertError::Parse(e.to_string()))?;
    let result = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(|s| s.to_string())
        .ok_or(CertError::NoCommonName);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed_der(cn: &str) -> Vec<u8> {
        let mut params = rcgen::CertificateParams::new(vec![]);
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, cn);
        let cert = rcgen::Certificate::from_params(params).unwrap();
        cert.serialize_der().unwrap()
    }

    #[test]
    fn extracts_common_name_from_leaf() {
        let der = self_signed_der("agent-001.telemetry.internal");
        let cn = extract_common_name(&[der]).unwrap();
        assert_eq!(cn, "agent-001.telemetry.internal");
    }

    #[test]
    fn missing_chain_is_an_error() {
        assert!(matches!(extract_common_name(&[]), Err(CertError::Missing)));
    }

    #[test]
    fn garbage_der_does_not_panic() {
        let err = extract_common_name(&[vec![0u8; 4]]).unwrap_err();
        assert!(matches!(err, CertError::Parse(_)));
    }
}
