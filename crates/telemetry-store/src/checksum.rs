//! BLAKE2b checksums for WAL rows and durable-log rows (§3.4, §3.5).

use blake2::{Blake2b512, Digest};

pub const CHECKSUM_LEN: usize = 64;

pub fn checksum(bytes: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Blake2b512::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest);
    out
}

pub fn verify_checksum(bytes: &[u8], expected: &[u8]) -> bool {
    expected.len() == CHECKSUM_LEN && checksum(bytes).as_slice() == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_deterministic() {
        let data = b"hello telemetry";
        assert_eq!(checksum(data), checksum(data));
    }

    #[test]
    fn checksum_detects_tamper() {
        let good = checksum(b"hello telemetry");
        assert!(verify_checksum(b"hello telemetry", &good));
        assert!(!verify_checksum(b"hello telemetrY", &good));
    }
}
