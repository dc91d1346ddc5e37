//! Hybrid Memory Search Manager
//!
//! Wraps a [`ChunkStore`] with query embedding and failure handling:
//!
//! 1. Ask the embedding provider for a query vector, bounded by
//!    `embedding_timeout_ms`. Timeout, provider error or an all-zero vector
//!    all fall back to keyword-only search with a warning.
//! 2. Run the store query on the blocking pool.
//! 3. On `StoreBusy`, retry once without the embedding. A second busy
//!    returns no results instead of an error.
//!
//! `StoreCorrupt` is surfaced unchanged and never retried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tuls_core::db::vector::is_zero_vector;
use tuls_core::{ChunkStore, SearchResult, StoreSearchOptions};

use super::embeddings::{EmbeddingProvider, RecoverableError};
use crate::config::MemoryConfig;
use crate::SDKResult;

/// Parameters for one memory search
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// Restrict results to this namespace
    pub namespace: Option<String>,
    /// Overrides the configured result limit
    pub max_results: Option<usize>,
    /// Overrides the configured score floor
    pub min_score: Option<f64>,
    /// Session the search runs on behalf of, used for log correlation
    pub session_key: Option<String>,
}

impl SearchRequest {
    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_session_key(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = Some(session_key.into());
        self
    }
}

/// Search over historical memory
#[async_trait]
pub trait MemorySearch: Send + Sync {
    /// Never fails on embedding or contention problems; only store
    /// corruption and unexpected database errors are returned.
    async fn search(&self, text: &str, request: &SearchRequest) -> SDKResult<Vec<SearchResult>>;
}

/// Counters describing how searches were served
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    pub searches: u64,
    pub vector_searches: u64,
    pub keyword_fallbacks: u64,
    pub busy_retries: u64,
    pub degraded: u64,
}

#[derive(Default)]
struct Counters {
    searches: AtomicU64,
    vector_searches: AtomicU64,
    keyword_fallbacks: AtomicU64,
    busy_retries: AtomicU64,
    degraded: AtomicU64,
}

/// Hybrid vector and keyword search over a chunk store
pub struct HybridSearchManager<S: ChunkStore + 'static> {
    store: Arc<S>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    config: MemoryConfig,
    counters: Counters,
}

impl<S: ChunkStore + 'static> HybridSearchManager<S> {
    /// Create a keyword-only manager
    pub fn new(store: Arc<S>, config: MemoryConfig) -> Self {
        Self {
            store,
            provider: None,
            config,
            counters: Counters::default(),
        }
    }

    /// Attach an embedding provider
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Whether an embedding provider is attached
    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Obtain a query embedding under the configured timeout.
    pub async fn query_embedding(&self, text: &str) -> Result<Vec<f32>, RecoverableError> {
        let Some(provider) = self.provider.as_ref() else {
            return Err(RecoverableError::Disabled);
        };

        let timeout_ms = self.config.embedding_timeout_ms;
        let embedding = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            provider.embed_query(text),
        )
        .await
        .map_err(|_| RecoverableError::Timeout(timeout_ms))?
        .map_err(|e| RecoverableError::Provider(e.to_string()))?;

        if is_zero_vector(&embedding) {
            return Err(RecoverableError::ZeroVector);
        }
        Ok(embedding)
    }

    /// Search memory for `text`
    pub async fn search(&self, text: &str, request: &SearchRequest) -> SDKResult<Vec<SearchResult>> {
        self.counters.searches.fetch_add(1, Ordering::Relaxed);

        let mut options = StoreSearchOptions::keyword(
            request.namespace.clone(),
            request.max_results.unwrap_or(self.config.max_results),
            request.min_score.unwrap_or(self.config.min_score),
        );

        match self.query_embedding(text).await {
            Ok(embedding) => {
                self.counters.vector_searches.fetch_add(1, Ordering::Relaxed);
                options.use_vector = true;
                options.query_embedding = Some(embedding);
            }
            Err(RecoverableError::Disabled) => {}
            Err(e) => {
                self.counters.keyword_fallbacks.fetch_add(1, Ordering::Relaxed);
                warn!(
                    error = %e,
                    session_key = ?request.session_key,
                    "Embedding unavailable, falling back to keyword search"
                );
            }
        }

        let first = self.run_store(text, options.clone()).await;
        let err = match first {
            Ok(results) => {
                debug!(
                    namespace = ?request.namespace,
                    session_key = ?request.session_key,
                    results = results.len(),
                    vector = options.use_vector,
                    "Memory search complete"
                );
                return Ok(results);
            }
            Err(e) if e.is_busy() => e,
            Err(e) => return Err(e.into()),
        };

        self.counters.busy_retries.fetch_add(1, Ordering::Relaxed);
        warn!(error = %err, "Chunk store busy, retrying keyword-only");

        let retry = StoreSearchOptions::keyword(options.namespace, options.max_results, options.min_score);
        match self.run_store(text, retry).await {
            Ok(results) => Ok(results),
            Err(e) if e.is_busy() => {
                self.counters.degraded.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Chunk store still busy, returning no results");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Snapshot of the search counters
    pub fn stats(&self) -> SearchStats {
        SearchStats {
            searches: self.counters.searches.load(Ordering::Relaxed),
            vector_searches: self.counters.vector_searches.load(Ordering::Relaxed),
            keyword_fallbacks: self.counters.keyword_fallbacks.load(Ordering::Relaxed),
            busy_retries: self.counters.busy_retries.load(Ordering::Relaxed),
            degraded: self.counters.degraded.load(Ordering::Relaxed),
        }
    }

    async fn run_store(
        &self,
        text: &str,
        options: StoreSearchOptions,
    ) -> tuls_core::Result<Vec<SearchResult>> {
        let store = Arc::clone(&self.store);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || store.search(&text, &options))
            .await
            .map_err(|e| tuls_core::Error::Other(format!("search task failed: {}", e)))?
    }
}

#[async_trait]
impl<S: ChunkStore + 'static> MemorySearch for HybridSearchManager<S> {
    async fn search(&self, text: &str, request: &SearchRequest) -> SDKResult<Vec<SearchResult>> {
        HybridSearchManager::search(self, text, request).await
    }
}
