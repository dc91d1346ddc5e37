//! Shared data types for the chunk store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of indexed memory content.
///
/// Chunks are immutable once indexed. Re-indexing a source file replaces
/// every chunk derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryChunk {
    pub id: String,
    pub content: String,
    pub namespace: String,
    pub source_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

/// Chunk content handed to the store by an ingestion process.
#[derive(Debug, Clone, Default)]
pub struct NewChunk {
    pub content: String,
    pub embedding: Option<Vec<f32>>,
}

impl NewChunk {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            embedding: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// One ranked hit. Produced per query, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub chunk_id: String,
    pub snippet: String,
    pub score: f64,
    pub namespace: String,
    pub source_file: String,
    pub created_at: DateTime<Utc>,
    pub match_kind: MatchKind,
}

/// Which ranking produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Keyword,
    Vector,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Vector => "vector",
        }
    }
}

/// Options for a single store query.
#[derive(Debug, Clone)]
pub struct StoreSearchOptions {
    /// Restrict hits to this namespace
    pub namespace: Option<String>,
    /// Run cosine similarity against stored embeddings as well
    pub use_vector: bool,
    /// Query embedding, required when `use_vector` is set
    pub query_embedding: Option<Vec<f32>>,
    /// Maximum number of results (default: 10)
    pub max_results: usize,
    /// Results scoring below this are dropped (default: 0.0)
    pub min_score: f64,
}

impl Default for StoreSearchOptions {
    fn default() -> Self {
        Self {
            namespace: None,
            use_vector: false,
            query_embedding: None,
            max_results: 10,
            min_score: 0.0,
        }
    }
}

impl StoreSearchOptions {
    pub fn keyword(namespace: Option<String>, max_results: usize, min_score: f64) -> Self {
        Self {
            namespace,
            max_results,
            min_score,
            ..Default::default()
        }
    }

    /// Vector search is only effective when an embedding is present.
    pub fn vector_enabled(&self) -> bool {
        self.use_vector && self.query_embedding.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// Outcome of re-indexing one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub source_file: String,
    pub inserted: usize,
    pub removed: usize,
    /// True when the stored chunks already matched and nothing was rewritten
    pub unchanged: bool,
}

/// Per-namespace chunk counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_chunks: usize,
    pub embedded_chunks: usize,
    pub sources: usize,
    pub namespaces: Vec<(String, usize)>,
}
