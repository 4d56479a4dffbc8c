//! A generic, monotonic-id, append-only row store on top of a `sled::Tree`.
//! Used as-is by both the agent WAL and the broker's durable log /
//! dedup index; each higher crate adds its own cap/TTL/quarantine policy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checksum;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// One row: `(id, idem, ts_ns, bytes, checksum)` (§3.4, §3.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    pub id: u64,
    pub idem: String,
    pub ts_ns: u64,
    pub bytes: Vec<u8>,
    pub checksum: Vec<u8>,
}

impl Row {
    pub fn checksum_valid(&self) -> bool {
        checksum::verify_checksum(&self.bytes, &self.checksum)
    }
}

fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn key_id(key: &[u8]) -> u64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&key[..8]);
    u64::from_be_bytes(arr)
}

/// An ordered, append-only row store backed by one `sled::Tree`.
pub struct RowStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl RowStore {
    pub fn open(db: &sled::Db, tree_name: &str) -> Result<Self, StoreError> {
        let tree = db.open_tree(tree_name)?;
        Ok(Self { db: db.clone(), tree })
    }

    /// Appends a new row with an autoincrementing id and the BLAKE2b
    /// checksum of `bytes`, durably (`flush` before returning).
    pub fn append(&self, idem: &str, ts_ns: u64, bytes: Vec<u8>) -> Result<Row, StoreError> {
        let id = self.db.generate_id()?;
        let checksum = checksum::checksum(&bytes).to_vec();
        let row = Row {
            id,
            idem: idem.to_string(),
            ts_ns,
            bytes,
            checksum,
        };
        let encoded = bincode::serialize(&row)?;
        self.tree.insert(id_key(id), encoded)?;
        self.tree.flush()?;
        Ok(row)
    }

    pub fn get(&self, id: u64) -> Result<Option<Row>, StoreError> {
        match self.tree.get(id_key(id))? {
            Some(ivec) => Ok(Some(bincode::deserialize(&ivec)?)),
            None => Ok(None),
        }
    }

    /// Returns up to `limit` rows starting at the smallest id `>= from_id`,
    /// in ascending id order, without removing them.
    pub fn scan_from(&self, from_id: u64, limit: usize) -> Result<Vec<Row>, StoreError> {
        let mut out = Vec::with_capacity(limit.min(64));
        for entry in self.tree.range(id_key(from_id)..) {
            let (_, ivec) = entry?;
            out.push(bincode::deserialize::<Row>(&ivec)?);
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    /// Deletes one row by id. Idempotent: missing ids are not an error.
    pub fn delete(&self, id: u64) -> Result<(), StoreError> {
        self.tree.remove(id_key(id))?;
        self.tree.flush()?;
        Ok(())
    }

    pub fn oldest_id(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.tree.iter().keys().next().transpose()?.map(|k| key_id(&k)))
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Total size in bytes of all stored `bytes` payloads (not counting row
    /// framing overhead), used for WAL cap accounting (§4.2).
    pub fn total_payload_bytes(&self) -> Result<u64, StoreError> {
        let mut total = 0u64;
        for entry in self.tree.iter() {
            let (_, ivec) = entry?;
            let row: Row = bincode::deserialize(&ivec)?;
            total += row.bytes.len() as u64;
        }
        Ok(total)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.tree.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile_like::TempDir, RowStore) {
        let dir = tempfile_like::TempDir::new();
        let db = crate::open_db(dir.path()).unwrap();
        let store = RowStore::open(&db, "rows").unwrap();
        (dir, store)
    }

    #[test]
    fn append_and_scan_preserves_order() {
        let (_dir, store) = temp_store();
        store.append("a", 1, b"one".to_vec()).unwrap();
        store.append("b", 2, b"two".to_vec()).unwrap();
        store.append("c", 3, b"three".to_vec()).unwrap();
        let rows = store.scan_from(0, 10).unwrap();
        let idems: Vec<_> = rows.iter().map(|r| r.idem.clone()).collect();
        assert_eq!(idems, vec!["a", "b", "c"]);
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, store) = temp_store();
        let row = store.append("a", 1, b"one".to_vec()).unwrap();
        store.delete(row.id).unwrap();
        store.delete(row.id).unwrap();
        assert!(store.get(row.id).unwrap().is_none());
    }

    #[test]
    fn row_checksum_detects_corruption() {
        let (_dir, store) = temp_store();
        let mut row = store.append("a", 1, b"one".to_vec()).unwrap();
        assert!(row.checksum_valid());
        row.bytes = b"tampered".to_vec();
        assert!(!row.checksum_valid());
    }

    // Minimal stand-in for `tempfile` so this crate does not need to depend
    // on it just for tests; creates a process-unique dir under std::env::temp_dir().
    mod tempfile_like {
        use std::path::{Path, PathBuf};

        pub struct TempDir(PathBuf);

        impl TempDir {
            pub fn new() -> Self {
                let mut p = std::env::temp_dir();
                let unique = format!(
                    "telemetry-store-test-{}-{}",
                    std::process::id(),
                    std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap()
                        .as_nanos()
                );
                p.push(unique);
                std::fs::create_dir_all(&p).unwrap();
                Self(p)
            }

            pub fn path(&self) -> &Path {
                &self.0
            }
        }

        impl Drop for TempDir {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }
    }
}
