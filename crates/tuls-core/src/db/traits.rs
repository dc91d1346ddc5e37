//! Chunk store trait defining the interface for search operations.

use crate::error::Result;
use crate::types::{SearchResult, StoreSearchOptions};

/// Core trait for chunk search.
///
/// Implementations handle the actual storage backend (SQLite, in-memory, etc.).
/// Calls are blocking; async callers should run them on a blocking thread.
pub trait ChunkStore: Send + Sync {
    /// Search chunks by keyword, and by vector when the options enable it.
    ///
    /// Fails with `StoreBusy` when the store stays locked past its busy
    /// timeout and with `StoreCorrupt` when the file is unreadable.
    fn search(&self, query: &str, options: &StoreSearchOptions) -> Result<Vec<SearchResult>>;
}
