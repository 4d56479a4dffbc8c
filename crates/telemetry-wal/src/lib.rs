//! Agent-local Write-Ahead Log (§4.2): a single-writer, single-drainer
//! durable FIFO. Built on `telemetry-store`'s row store; this crate owns
//! the cap-based eviction, checksum-on-peek quarantine, and the counters
//! external monitoring must surface.

mod error;

pub use error::{WalError, WalResult};

use std::sync::atomic::{AtomicU64, Ordering};

use telemetry_store::{open_db, Row, RowStore};
use tracing::{info, warn};

/// Default WAL byte cap (`wal_max_bytes`, §4.3 default 200 MiB).
pub const DEFAULT_WAL_MAX_BYTES: u64 = 200 * 1024 * 1024;

/// Outcome of [`Wal::append`]: the assigned id, and how many oldest rows (if
/// any) were dropped to make room under the byte cap (§4.2, I4).
#[derive(Debug, Clone, Copy)]
pub struct AppendOutcome {
    pub id: u64,
    pub dropped_oldest: u64,
}

/// A batch row returned by [`Wal::peek_batch`]; corrupted rows never appear
/// here — they are quarantined internally and a counter is incremented.
#[derive(Debug, Clone)]
pub struct WalRow {
    pub id: u64,
    pub idem: String,
    pub ts_ns: u64,
    pub bytes: Vec<u8>,
}

impl From<Row> for WalRow {
    fn from(row: Row) -> Self {
        WalRow {
            id: row.id,
            idem: row.idem,
            ts_ns: row.ts_ns,
            bytes: row.bytes,
        }
    }
}

pub struct Wal {
    rows: RowStore,
    quarantine: RowStore,
    cap_bytes: u64,
    dropped_oldest_total: AtomicU64,
    quarantined_total: AtomicU64,
}

impl Wal {
    pub fn open(path: impl AsRef<std::path::Path>, cap_bytes: u64) -> WalResult<Self> {
        let db = open_db(path.as_ref())
            .map_err(|_| WalError::OpenFailure(path.as_ref().display().to_string()))?;
        let rows = RowStore::open(&db, "wal_rows")?;
        let quarantine = RowStore::open(&db, "wal_quarantine")?;
        Ok(Self {
            rows,
            quarantine,
            cap_bytes,
            dropped_oldest_total: AtomicU64::new(0),
            quarantined_total: AtomicU64::new(0),
        })
    }

    /// Atomically inserts; if doing so would push total bytes over the cap,
    /// deletes oldest rows first and reports how many were dropped (I4).
    pub fn append(&self, bytes: Vec<u8>, idem: &str, ts_ns: u64) -> WalResult<AppendOutcome> {
        let mut dropped = 0u64;
        let incoming_len = bytes.len() as u64;
        let mut total = self.rows.total_payload_bytes()?;

        while total + incoming_len > self.cap_bytes {
            let Some(oldest_id) = self.rows.oldest_id()? else {
                break;
            };
            if let Some(oldest) = self.rows.get(oldest_id)? {
                total = total.saturating_sub(oldest.bytes.len() as u64);
            }
            self.rows.delete(oldest_id)?;
            dropped += 1;
        }

        if dropped > 0 {
            self.dropped_oldest_total.fetch_add(dropped, Ordering::Relaxed);
            warn!(dropped, "wal at capacity, dropped oldest rows");
        }

        let row = self.rows.append(idem, ts_ns, bytes)?;
        Ok(AppendOutcome {
            id: row.id,
            dropped_oldest: dropped,
        })
    }

    /// Returns up to `limit` rows in ascending `id` order without removing
    /// them. Rows that fail checksum validation are quarantined in place
    /// and skipped — drain makes progress rather than looping on poison
    /// data (§4.2 Edge policies).
    pub fn peek_batch(&self, limit: usize) -> WalResult<Vec<WalRow>> {
        let candidates = self.rows.scan_from(0, limit.saturating_mul(2).max(limit))?;
        let mut out = Vec::with_capacity(limit);
        for row in candidates {
            if out.len() >= limit {
                break;
            }
            if row.checksum_valid() {
                out.push(row.into());
            } else {
                self.quarantine_row(row)?;
            }
        }
        Ok(out)
    }

    fn quarantine_row(&self, row: Row) -> WalResult<()> {
        warn!(id = row.id, idem = %row.idem, "wal row failed checksum, quarantining");
        self.quarantine
            .append(&row.idem, row.ts_ns, row.bytes.clone())?;
        self.rows.delete(row.id)?;
        self.quarantined_total.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Removes one row. Idempotent (§4.2).
    pub fn delete(&self, id: u64) -> WalResult<()> {
        self.rows.delete(id).map_err(WalError::from)
    }

    pub fn backlog_bytes(&self) -> WalResult<u64> {
        self.rows.total_payload_bytes().map_err(WalError::from)
    }

    pub fn backlog_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dropped_oldest_total(&self) -> u64 {
        self.dropped_oldest_total.load(Ordering::Relaxed)
    }

    pub fn quarantined_total(&self) -> u64 {
        self.quarantined_total.load(Ordering::Relaxed)
    }

    pub fn flush(&self) -> WalResult<()> {
        self.rows.flush()?;
        self.quarantine.flush()?;
        info!("wal flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_wal(cap_bytes: u64) -> (PathGuard, Wal) {
        let guard = PathGuard::new();
        let wal = Wal::open(guard.path(), cap_bytes).unwrap();
        (guard, wal)
    }

    struct PathGuard(std::path::PathBuf);
    impl PathGuard {
        fn new() -> Self {
            let mut p = std::env::temp_dir();
            p.push(format!(
                "telemetry-wal-test-{}-{}",
                std::process::id(),
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap()
                    .as_nanos()
            ));
            std::fs::create_dir_all(&p).unwrap();
            Self(p)
        }
        fn path(&self) -> &std::path::Path {
            &self.0
        }
    }
    impl Drop for PathGuard {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn fifo_drain_order() {
        let (_g, wal) = temp_wal(DEFAULT_WAL_MAX_BYTES);
        wal.append(b"one".to_vec(), "a", 1).unwrap();
        wal.append(b"two".to_vec(), "b", 2).unwrap();
        wal.append(b"three".to_vec(), "c", 3).unwrap();
        let batch = wal.peek_batch(10).unwrap();
        let idems: Vec<_> = batch.iter().map(|r| r.idem.clone()).collect();
        assert_eq!(idems, vec!["a", "b", "c"]);
    }

    #[test]
    fn cap_triggers_oldest_drop() {
        let (_g, wal) = temp_wal(16);
        wal.append(vec![0u8; 10], "a", 1).unwrap();
        let outcome = wal.append(vec![0u8; 10], "b", 2).unwrap();
        assert_eq!(outcome.dropped_oldest, 1);
        assert_eq!(wal.dropped_oldest_total(), 1);
        let batch = wal.peek_batch(10).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].idem, "b");
    }

    #[test]
    fn delete_is_idempotent() {
        let (_g, wal) = temp_wal(DEFAULT_WAL_MAX_BYTES);
        let outcome = wal.append(b"one".to_vec(), "a", 1).unwrap();
        wal.delete(outcome.id).unwrap();
        wal.delete(outcome.id).unwrap();
        assert!(wal.is_empty());
    }
}
