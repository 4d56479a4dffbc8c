use thiserror::Error;

/// Errors raised while reading or writing the agent's write-ahead log.
///
/// Mirrors the shape of a dedicated WAL error enum (one variant per failure
/// mode, structured fields where they help diagnosis) rather than folding
/// storage failures into a single generic "IO error" string.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("wal storage error: {0}")]
    Storage(#[from] telemetry_store::StoreError),

    #[error("row {id} failed checksum validation and was quarantined")]
    Quarantined { id: u64 },

    #[error("wal directory {0} could not be opened")]
    OpenFailure(String),
}

pub type WalResult<T> = Result<T, WalError>;
