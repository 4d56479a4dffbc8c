use prometheus::{IntCounter, IntGauge, Registry};

/// Counters/gauges named after §7's error table and §4.2/§4.3's metering
/// requirements ("every drop is counted and labeled by reason").
pub struct AgentMetrics {
    pub registry: Registry,
    pub dropped_oversize_total: IntCounter,
    pub dropped_ratelimited_total: IntCounter,
    pub wal_dropped_oldest_total: IntCounter,
    pub wal_quarantined_total: IntCounter,
    pub broker_overload_total: IntCounter,
    pub dropped_invalid_total: IntCounter,
    pub wal_backlog_bytes: IntGauge,
    pub wal_backlog_count: IntGauge,
}

impl AgentMetrics {
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
            dropped_oversize_total: counter!(
                "dropped_oversize_total",
                "envelopes dropped for exceeding max_env_bytes"
            ),
            dropped_ratelimited_total: counter!(
                "dropped_ratelimited_total",
                "envelopes dropped by the local token bucket"
            ),
            wal_dropped_oldest_total: counter!(
                "wal_dropped_oldest_total",
                "oldest wal rows dropped to respect wal_max_bytes"
            ),
            wal_quarantined_total: counter!(
                "wal_quarantined_total",
                "wal rows quarantined for failing checksum validation"
            ),
            broker_overload_total: counter!(
                "broker_overload_total",
                "publish attempts that received AckStatus::Overload"
            ),
            dropped_invalid_total: counter!(
                "dropped_invalid_total",
                "envelopes/wal rows permanently rejected by the broker as AckStatus::Invalid and dropped without retry"
            ),
            wal_backlog_bytes: gauge!("wal_backlog_bytes", "current wal backlog size in bytes"),
            wal_backlog_count: gauge!("wal_backlog_count", "current wal backlog row count"),
            registry,
        }
    }
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}
