//! Agent Publisher (§4.3): two cooperating loops sharing one WAL handle and
//! one broker connection — the submit path (sensors call in) and the drain
//! loop (background task draining the WAL in order).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use prost::Message as _;
use rand::Rng;
use telemetry_core::error::AgentSubmitError;
use telemetry_core::types::{
    Ack, AckStatus, Envelope, IdempotencyKey, Payload, Priority, SigningAlgorithm,
};
use telemetry_crypto::EnvelopeSigner;
use telemetry_wal::Wal;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::client::{BrokerClient, ClientError};
use crate::config::AgentConfig;
use crate::idem;
use crate::metrics::AgentMetrics;
use crate::rate_limit::TokenBucket;

enum PublishError {
    Client(ClientError),
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    DroppedOversize,
    DroppedRateLimited,
    /// Broker rejected the envelope as permanently invalid (bad signature or
    /// unauthorized peer). Terminal — never queued to the WAL for retry.
    DroppedInvalid,
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// delay for attempt `n` = `min(2.0s, 0.05 * 2^n) * uniform(0.5, 1.5)` (§4.3).
fn backoff_delay(attempt: u32) -> std::time::Duration {
    let base = (0.05_f64 * 2f64.powi(attempt as i32)).min(2.0);
    let jitter = rand::thread_rng().gen_range(0.5..1.5);
    std::time::Duration::from_secs_f64(base * jitter)
}

fn jittered_hint(hint_ms: u64) -> std::time::Duration {
    let jitter = rand::thread_rng().gen_range(0.8..1.2);
    std::time::Duration::from_millis((hint_ms as f64 * jitter) as u64)
}

pub struct Publisher {
    config: AgentConfig,
    wal: Arc<Wal>,
    signer: Arc<EnvelopeSigner>,
    client: Mutex<BrokerClient>,
    prev_sig: Mutex<Vec<u8>>,
    rate_limiter: TokenBucket,
    pub metrics: Arc<AgentMetrics>,
    shutting_down: AtomicBool,
}

impl Publisher {
    pub fn new(
        config: AgentConfig,
        wal: Arc<Wal>,
        signer: Arc<EnvelopeSigner>,
        client: BrokerClient,
        metrics: Arc<AgentMetrics>,
    ) -> Arc<Self> {
        let rate_limiter = TokenBucket::new(config.send_rate_eps);
        Arc::new(Self {
            config,
            wal,
            signer,
            client: Mutex::new(client),
            prev_sig: Mutex::new(Vec::new()),
            rate_limiter,
            metrics,
            shutting_down: AtomicBool::new(false),
        })
    }

    fn build_unsigned(&self, payload: Payload, priority: Priority, requires_ack: bool) -> (Envelope, u64) {
        let ts_ns = now_ns();
        let idem = idem::derive(&self.config.agent_id, ts_ns, &payload);
        let key = IdempotencyKey::new(idem).expect("derived idem key within length bound");
        let env = Envelope {
            version: "v1".to_string(),
            ts_ns,
            idempotency_key: key,
            payload,
            sig: vec![0u8; 64],
            prev_sig: Vec::new(),
            signing_algorithm: SigningAlgorithm::Ed25519,
            priority,
            requires_acknowledgment: requires_ack,
        };
        (env, ts_ns)
    }

    fn encoded_len(env: &Envelope) -> usize {
        let pb: telemetry_proto::PbEnvelope = env.into();
        pb.encoded_len()
    }

    async fn finalize_signature(&self, mut env: Envelope) -> Envelope {
        let canonical = telemetry_crypto::canonical(&env);
        let sig = self.signer.sign(&canonical);
        let mut prev = self.prev_sig.lock().await;
        env.prev_sig = prev.clone();
        env.sig = sig.clone();
        *prev = sig;
        env
    }

    /// `submit(record) -> Accepted | DroppedOversize | DroppedRateLimited` (§4.3).
    pub async fn submit(
        &self,
        payload: Payload,
        priority: Priority,
        requires_ack: bool,
    ) -> Result<SubmitOutcome, AgentSubmitError> {
        let (draft, ts_ns) = self.build_unsigned(payload, priority, requires_ack);

        if Self::encoded_len(&draft) > self.config.max_env_bytes {
            let err = AgentSubmitError::OversizePayload;
            warn!(error = %err, "dropping envelope");
            self.metrics.dropped_oversize_total.inc();
            return Ok(SubmitOutcome::DroppedOversize);
        }

        if !self.rate_limiter.try_acquire() {
            let err = AgentSubmitError::RateLimited;
            warn!(error = %err, "dropping envelope");
            self.metrics.dropped_ratelimited_total.inc();
            return Ok(SubmitOutcome::DroppedRateLimited);
        }

        let env = self.finalize_signature(draft).await;
        let idem = env.idempotency_key.as_str().to_string();

        let timeout = std::time::Duration::from_secs_f64(self.config.retry_timeout_s);
        match self.publish_with_timeout(&env, timeout).await {
            Ok(ack) => self.handle_submit_ack(ack, env, &idem, ts_ns).await,
            Err(PublishError::Client(ClientError::Transport(e))) => {
                warn!(idem = %idem, error = %e, "transient transport failure on submit, spilling to wal");
                self.wal_append(&env, &idem, ts_ns)?;
                Ok(SubmitOutcome::Accepted)
            }
            Err(PublishError::Client(ClientError::BadResponse(e))) => {
                error!(idem = %idem, error = %e, "bad response decoding broker ack, spilling to wal");
                self.wal_append(&env, &idem, ts_ns)?;
                Ok(SubmitOutcome::Accepted)
            }
            Err(PublishError::Timeout) => {
                warn!(idem = %idem, "publish attempt exceeded retry_timeout_s, spilling to wal");
                self.wal_append(&env, &idem, ts_ns)?;
                Ok(SubmitOutcome::Accepted)
            }
        }
    }

    async fn handle_submit_ack(
        &self,
        ack: Ack,
        env: Envelope,
        idem: &str,
        ts_ns: u64,
    ) -> Result<SubmitOutcome, AgentSubmitError> {
        match ack.status {
            AckStatus::Ok => Ok(SubmitOutcome::Accepted),
            AckStatus::Overload => {
                let err = AgentSubmitError::BrokerOverload {
                    backoff_hint_ms: ack.backoff_hint_ms,
                };
                warn!(idem = %idem, error = %err, "spilling to wal");
                self.metrics.broker_overload_total.inc();
                self.wal_append(&env, idem, ts_ns)?;
                Ok(SubmitOutcome::Accepted)
            }
            AckStatus::Invalid => {
                error!(idem = %idem, reason = %ack.reason, "broker permanently rejected envelope, dropping");
                self.metrics.dropped_invalid_total.inc();
                Ok(SubmitOutcome::DroppedInvalid)
            }
        }
    }

    /// Holds the client mutex for the duration of one timed publish call,
    /// serializing publishes so the per-agent FIFO ordering guarantee (§5)
    /// holds: only one in-flight publish per agent at a time.
    async fn publish_with_timeout(
        &self,
        env: &Envelope,
        timeout: std::time::Duration,
    ) -> Result<Ack, PublishError> {
        let mut client = self.client.lock().await;
        match tokio::time::timeout(timeout, client.publish(env)).await {
            Ok(Ok(ack)) => Ok(ack),
            Ok(Err(e)) => Err(PublishError::Client(e)),
            Err(_) => Err(PublishError::Timeout),
        }
    }

    fn wal_append(&self, env: &Envelope, idem: &str, ts_ns: u64) -> Result<(), AgentSubmitError> {
        let bytes = bincode::serialize(env)
            .map_err(|e| AgentSubmitError::TransientTransport(e.to_string()))?;
        self.wal
            .append(bytes, idem, ts_ns)
            .map_err(|e| AgentSubmitError::TransientTransport(e.to_string()))?;
        Ok(())
    }

    pub fn request_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Drain loop (§4.3 loop 2): peeks the WAL in order, attempts publish
    /// for each row, and stops the current pass on overload backpressure or
    /// exhausted retries rather than hot-looping against a dead broker.
    pub async fn drain_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let idle_interval = std::time::Duration::from_millis(250);
        loop {
            if *shutdown.borrow() {
                break;
            }

            if self.wal.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(idle_interval) => {}
                    _ = shutdown.changed() => {}
                }
                continue;
            }

            self.metrics
                .wal_backlog_bytes
                .set(self.wal.backlog_bytes().unwrap_or(0) as i64);
            self.metrics
                .wal_backlog_count
                .set(self.wal.backlog_count() as i64);

            let batch = match self.wal.peek_batch(self.config.draining_batch_size) {
                Ok(b) => b,
                Err(e) => {
                    error!(error = %e, "wal peek_batch failed");
                    tokio::time::sleep(idle_interval).await;
                    continue;
                }
            };

            'batch: for row in batch {
                if *shutdown.borrow() {
                    break 'batch;
                }
                let env: Envelope = match bincode::deserialize(&row.bytes) {
                    Ok(e) => e,
                    Err(e) => {
                        error!(id = row.id, error = %e, "undecodable wal row, deleting");
                        let _ = self.wal.delete(row.id);
                        continue;
                    }
                };

                let mut attempt = 0u32;
                loop {
                    attempt += 1;
                    let timeout = std::time::Duration::from_secs_f64(self.config.retry_timeout_s);
                    match self.publish_with_timeout(&env, timeout).await {
                        Ok(ack) => match ack.status {
                            AckStatus::Ok => {
                                let _ = self.wal.delete(row.id);
                                break;
                            }
                            AckStatus::Overload => {
                                let err = AgentSubmitError::BrokerOverload {
                                    backoff_hint_ms: ack.backoff_hint_ms,
                                };
                                warn!(id = row.id, error = %err, "pausing drain pass");
                                self.metrics.broker_overload_total.inc();
                                tokio::time::sleep(jittered_hint(ack.backoff_hint_ms)).await;
                                break 'batch;
                            }
                            AckStatus::Invalid => {
                                error!(id = row.id, reason = %ack.reason, "broker permanently rejected wal row, dropping");
                                self.metrics.dropped_invalid_total.inc();
                                let _ = self.wal.delete(row.id);
                                break;
                            }
                        },
                        Err(_) => {
                            if attempt >= self.config.retry_max_attempts {
                                warn!(id = row.id, attempt, "exhausted retries this pass, stopping drain pass");
                                break 'batch;
                            }
                            tokio::time::sleep(backoff_delay(attempt)).await;
                        }
                    }
                }
            }
        }
        info!("drain loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_bounded_by_two_seconds() {
        for attempt in 0..20 {
            let d = backoff_delay(attempt);
            assert!(d.as_secs_f64() <= 3.0, "attempt {attempt} backoff too large: {d:?}");
        }
    }
}
