//! Idempotency-key dedup index (§3.3, §4.4 step 7): a TTL-bounded set of
//! recently-seen idempotency keys. Built directly on a `sled::Tree` rather
//! than `telemetry_store::RowStore` — entries are looked up by key, not
//! drained in FIFO order, so the row-store's autoincrement-id shape doesn't
//! fit; expiry is checked lazily on read and swept periodically to bound
//! disk growth.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("dedup storage error: {0}")]
    Storage(#[from] sled::Error),
}

pub struct DedupIndex {
    tree: sled::Tree,
    ttl_ns: u64,
}

impl DedupIndex {
    pub fn open(db: &sled::Db, ttl_s: u64) -> Result<Self, DedupError> {
        let tree = db.open_tree("dedup_index")?;
        Ok(Self {
            tree,
            ttl_ns: ttl_s.saturating_mul(1_000_000_000),
        })
    }

    /// Returns `true` if `idem` was already seen and has not yet expired
    /// (a duplicate, §3.3 I7). Otherwise records it with an expiry of
    /// `now_ns + ttl_ns` and returns `false`.
    pub fn check_and_insert(&self, idem: &str, now_ns: u64) -> Result<bool, DedupError> {
        if let Some(existing) = self.tree.get(idem.as_bytes())? {
            let expiry = decode_expiry(&existing);
            if now_ns < expiry {
                return Ok(true);
            }
        }
        let expiry = now_ns.saturating_add(self.ttl_ns);
        self.tree.insert(idem.as_bytes(), &expiry.to_be_bytes())?;
        Ok(false)
    }

    /// Removes every entry whose expiry has passed. Intended to run on a
    /// slow periodic timer so the tree does not grow unbounded (§4.4).
    pub fn sweep_expired(&self, now_ns: u64) -> Result<u64, DedupError> {
        let mut removed = 0u64;
        let mut expired_keys = Vec::new();
        for entry in self.tree.iter() {
            let (key, value) = entry?;
            if decode_expiry(&value) <= now_ns {
                expired_keys.push(key);
            }
        }
        for key in expired_keys {
            self.tree.remove(key)?;
            removed += 1;
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

fn decode_expiry(ivec: &[u8]) -> u64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&ivec[..8]);
    u64::from_be_bytes(arr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_index(ttl_s: u64) -> (PathGuard, DedupIndex) {
        let guard = PathGuard::new();
        let db = sled::open(guard.path()).unwrap();
        let index = DedupIndex::open(&db, ttl_s).unwrap();
        (guard, index)
    }

    struct PathGuard(std::path::PathBuf);
    impl PathGuard {
        fn new() -> Self {
            let mut p = std::env::temp_dir();
            p.push(format!(
                "telemetry-broker-dedup-test-{}-{}",
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
    fn first_seen_is_not_duplicate() {
        let (_g, index) = temp_index(300);
        assert!(!index.check_and_insert("abc", 0).unwrap());
    }

    #[test]
    fn repeat_within_ttl_is_duplicate() {
        let (_g, index) = temp_index(300);
        assert!(!index.check_and_insert("abc", 0).unwrap());
        assert!(index.check_and_insert("abc", 1_000_000_000).unwrap());
    }

    #[test]
    fn repeat_after_ttl_is_not_duplicate() {
        let (_g, index) = temp_index(1);
        assert!(!index.check_and_insert("abc", 0).unwrap());
        let after_ttl = 2_000_000_000u64;
        assert!(!index.check_and_insert("abc", after_ttl).unwrap());
    }

    #[test]
    fn sweep_removes_expired_only() {
        let (_g, index) = temp_index(1);
        index.check_and_insert("old", 0).unwrap();
        index.check_and_insert("new", 5_000_000_000).unwrap();
        let removed = index.sweep_expired(2_000_000_000).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(index.len(), 1);
    }
}
