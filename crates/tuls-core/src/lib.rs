//! tuls-core - Core library for Tuls
//!
//! This crate provides the storage engine shared by the Tuls SDK and the
//! external ingestion tooling:
//!
//! - **db**: SQLite memory chunk store with FTS5 keyword and cosine vector search
//! - **types**: Chunk and search result types
//! - **error**: Storage error taxonomy (`StoreBusy`, `StoreCorrupt`, ...)

pub mod db;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use db::{ChunkStore, SqliteChunkStore, StoreConfig};
pub use error::{Error, Result};
pub use types::{MatchKind, MemoryChunk, NewChunk, SearchResult, StoreSearchOptions};
