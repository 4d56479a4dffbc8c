//! Small embedded-KV helper shared by the agent WAL and the broker's
//! durable log: opens a `sled::Db`, and provides a monotonic-id row store
//! plus BLAKE2b checksum helpers. Higher crates layer their own semantics
//! (drain ordering, cap eviction, dedup) on top of this.

pub mod checksum;
pub mod row_store;

pub use checksum::{checksum, verify_checksum, CHECKSUM_LEN};
pub use row_store::{Row, RowStore, StoreError};

/// Opens (or creates) a sled database at `path`, mapping failures the way
/// the teacher's `StateDb::open` does — one `StoreError::Storage` variant,
/// not a bag of possible sled error shapes leaking upward.
pub fn open_db(path: impl AsRef<std::path::Path>) -> Result<sled::Db, StoreError> {
    sled::open(path).map_err(StoreError::Storage)
}
