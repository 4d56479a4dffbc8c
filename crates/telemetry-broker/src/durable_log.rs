//! Durable append-only log of accepted envelopes (§4.4 step 8). Reuses
//! `telemetry_store::RowStore` exactly as the agent WAL does — any embedded
//! store meeting the durability, ordering and cap semantics is acceptable
//! (Design Notes), and the row-store abstraction already covers this shape.

use telemetry_store::{RowStore, StoreError};

pub struct DurableLog {
    rows: RowStore,
}

impl DurableLog {
    pub fn open(db: &sled::Db) -> Result<Self, StoreError> {
        let rows = RowStore::open(db, "broker_log")?;
        Ok(Self { rows })
    }

    pub fn append(&self, idem: &str, ts_ns: u64, bytes: Vec<u8>) -> Result<u64, StoreError> {
        let row = self.rows.append(idem, ts_ns, bytes)?;
        Ok(row.id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.rows.flush()
    }
}
