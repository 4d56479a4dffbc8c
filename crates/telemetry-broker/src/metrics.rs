use prometheus::{IntCounter, IntGauge, Registry};

/// Broker-side counters/gauges (§4.4, §7).
pub struct BrokerMetrics {
    pub registry: Registry,
    pub inflight: IntGauge,
    pub overload_total: IntCounter,
    pub duplicate_total: IntCounter,
    pub persist_failed_total: IntCounter,
    pub dropped_oversize_total: IntCounter,
    pub signature_invalid_total: IntCounter,
    pub unauthorized_peer_total: IntCounter,
    pub accepted_total: IntCounter,
}

impl BrokerMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        macro_rules! counter {
            ($name:literal, $help:literal) => {{
                let c = IntCounter::new($name, $help).unwrap();
                registry.register(Box::new(c.clone())).unwrap();
                c
            }};
        }
        macro_rules! gauge {
            ($name:literal, $help:literal) => {{
                let g = IntGauge::new($name, $help).unwrap();
                registry.register(Box::new(g.clone())).unwrap();
                g
            }};
        }

        Self {
            inflight: gauge!("broker_inflight", "requests currently being admitted/processed"),
            overload_total: counter!(
                "broker_overload_total",
                "requests rejected OVERLOAD (soft or hard inflight cap, or overload_mode)"
            ),
            duplicate_total: counter!(
                "broker_duplicate_total",
                "requests short-circuited by the dedup index"
            ),
            persist_failed_total: counter!(
                "broker_persist_failed_total",
                "requests that failed durable append after passing admission"
            ),
            dropped_oversize_total: counter!(
                "dropped_oversize_total",
                "envelopes rejected INVALID for exceeding max_env_bytes"
            ),
            signature_invalid_total: counter!(
                "broker_signature_invalid_total",
                "envelopes rejected INVALID for signature verification failure"
            ),
            unauthorized_peer_total: counter!(
                "broker_unauthorized_peer_total",
                "requests rejected for an unrecognized or untrusted peer CN"
            ),
            accepted_total: counter!("broker_accepted_total", "envelopes durably accepted"),
            registry,
        }
    }
}

impl Default for BrokerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
