//! Error types for tuls-core.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type alias using tuls-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for chunk store operations
#[derive(Error, Debug)]
pub enum Error {
    // Contention errors
    #[error("Chunk store busy after waiting {timeout_ms}ms for a lock")]
    StoreBusy { timeout_ms: u64 },

    // Fatal storage errors
    #[error("Chunk store is corrupt: {0}")]
    StoreCorrupt(String),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Classify a SQLite error, mapping lock contention and corruption
    /// onto the store-level variants.
    pub fn from_sqlite(err: rusqlite::Error, busy_timeout_ms: u64) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => Self::StoreBusy {
                timeout_ms: busy_timeout_ms,
            },
            Some(ErrorCode::DatabaseCorrupt) | Some(ErrorCode::NotADatabase) => {
                Self::StoreCorrupt(err.to_string())
            }
            _ => Self::Database(err),
        }
    }

    /// Transient contention; the caller may retry.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::StoreBusy { .. })
    }

    /// Corruption is never retried.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::StoreCorrupt(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::from_sqlite(err, 0)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
