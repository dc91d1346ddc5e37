//! Hybrid Memory Search
//!
//! Retrieves historical context from the shared chunk store. Searches use
//! vector similarity when a query embedding is available and keyword
//! full-text ranking otherwise; embedding or contention failures degrade
//! relevance, never availability.

pub mod embeddings;
mod search;

pub use embeddings::{EmbeddingProvider, RecoverableError, EMBEDDING_DIMENSIONS};
#[cfg(feature = "embeddings")]
pub use embeddings::LocalEmbeddingProvider;
#[cfg(feature = "http-embeddings")]
pub use embeddings::HttpEmbeddingProvider;

pub use search::{HybridSearchManager, MemorySearch, SearchRequest, SearchStats};
