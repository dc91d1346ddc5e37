//! Query Embedding Providers
//!
//! The hybrid search manager asks a provider for one query vector per
//! search. Two providers ship with the SDK:
//!
//! - [`LocalEmbeddingProvider`]: local inference with `fastembed`
//!   (all-MiniLM-L6-v2, 384 dimensions), feature `embeddings`
//! - [`HttpEmbeddingProvider`]: an OpenAI- or Ollama-compatible
//!   `/embeddings` endpoint, feature `http-embeddings`
//!
//! Provider failures never reach search callers; they are folded into
//! [`RecoverableError`] and trigger keyword-only search.

use async_trait::async_trait;
use thiserror::Error;

use crate::SDKResult;

/// Embedding dimensions for all-MiniLM-L6-v2
pub const EMBEDDING_DIMENSIONS: usize = 384;

/// Source of query embeddings
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one query text
    async fn embed_query(&self, text: &str) -> SDKResult<Vec<f32>>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

/// Why a query ran without a vector
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecoverableError {
    #[error("no embedding provider configured")]
    Disabled,

    #[error("embedding provider timed out after {0}ms")]
    Timeout(u64),

    #[error("embedding provider failed: {0}")]
    Provider(String),

    #[error("embedding provider returned an all-zero vector")]
    ZeroVector,
}

// ─────────────────────────────────────────────────────────────────────────────
// Local provider
// ─────────────────────────────────────────────────────────────────────────────

/// Local fastembed provider with lazy model loading.
///
/// Model download, load and inference all run on the blocking pool, so a
/// caller's timeout fires even while the first load is still in progress.
/// A load abandoned by a timed-out caller keeps running and serves the
/// next query.
#[cfg(feature = "embeddings")]
pub struct LocalEmbeddingProvider {
    model: std::sync::Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "embeddings")]
impl Default for LocalEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "embeddings")]
impl LocalEmbeddingProvider {
    pub fn new() -> Self {
        Self {
            model: std::sync::Arc::new(std::sync::Mutex::new(None)),
        }
    }

    /// True once the model is in memory. Reports false while a load holds the lock.
    pub fn is_loaded(&self) -> bool {
        matches!(self.model.try_lock(), Ok(guard) if guard.is_some())
    }

    fn load_model() -> SDKResult<fastembed::TextEmbedding> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        tracing::info!(model = "all-MiniLM-L6-v2", "Loading embedding model");
        let start = std::time::Instant::now();

        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false);
        let model = TextEmbedding::try_new(options).map_err(|e| {
            crate::SDKError::embedding(format!("failed to load embedding model: {}", e))
        })?;

        tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "Embedding model loaded");
        Ok(model)
    }

    fn embed_blocking(
        model: &std::sync::Mutex<Option<fastembed::TextEmbedding>>,
        text: &str,
    ) -> SDKResult<Vec<f32>> {
        let mut guard = model
            .lock()
            .map_err(|_| crate::SDKError::embedding("embedding model lock poisoned"))?;
        if guard.is_none() {
            *guard = Some(Self::load_model()?);
        }
        let model = guard
            .as_mut()
            .ok_or_else(|| crate::SDKError::embedding("embedding model not initialized"))?;

        model
            .embed(vec![text], None)
            .map_err(|e| crate::SDKError::embedding(format!("failed to generate embedding: {}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| crate::SDKError::embedding("no embedding generated"))
    }
}

#[cfg(feature = "embeddings")]
#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed_query(&self, text: &str) -> SDKResult<Vec<f32>> {
        let model = std::sync::Arc::clone(&self.model);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || Self::embed_blocking(&model, &text))
            .await
            .map_err(|e| crate::SDKError::embedding(format!("embedding task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        "fastembed"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP provider
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI-compatible embeddings endpoint.
///
/// Accepts both the OpenAI response shape (`data[0].embedding`) and the
/// Ollama shape (`embedding`).
#[cfg(feature = "http-embeddings")]
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[cfg(feature = "http-embeddings")]
#[derive(serde::Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[cfg(feature = "http-embeddings")]
#[derive(serde::Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

#[cfg(feature = "http-embeddings")]
#[derive(serde::Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(feature = "http-embeddings")]
impl HttpEmbeddingProvider {
    /// Default model requested when none is configured
    pub const DEFAULT_MODEL: &'static str = "text-embedding-3-small";

    pub fn new(
        endpoint: impl Into<String>,
        model: Option<String>,
        api_key: Option<String>,
    ) -> SDKResult<Self> {
        use anyhow::Context;

        // Callers bound each request with their own timeout
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            api_key,
        })
    }

    /// Build from config, reading the API key from the configured env var
    pub fn from_config(config: &crate::config::EmbeddingConfig) -> SDKResult<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| crate::SDKError::embedding("http provider requires an endpoint"))?;
        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok());
        Self::new(endpoint, config.model.clone(), api_key)
    }
}

#[cfg(feature = "http-embeddings")]
#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_query(&self, text: &str) -> SDKResult<Vec<f32>> {
        let url = format!("{}/embeddings", self.endpoint);
        let mut request = self.client.post(&url).json(&EmbeddingRequest {
            model: &self.model,
            input: text,
        });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| crate::SDKError::embedding(e.to_string()))?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| crate::SDKError::embedding(format!("malformed embedding response: {}", e)))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .or(body.embedding)
            .ok_or_else(|| crate::SDKError::embedding("embedding response contained no vector"))
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_error_messages() {
        assert!(RecoverableError::Timeout(5000).to_string().contains("5000ms"));
        assert!(RecoverableError::ZeroVector.to_string().contains("all-zero"));
    }

    #[cfg(feature = "http-embeddings")]
    #[test]
    fn test_http_response_shapes() {
        let openai: EmbeddingResponse =
            serde_json::from_str(r#"{"data":[{"embedding":[0.1,0.2]}],"model":"m"}"#).unwrap();
        assert_eq!(openai.data[0].embedding, vec![0.1, 0.2]);

        let ollama: EmbeddingResponse = serde_json::from_str(r#"{"embedding":[0.3]}"#).unwrap();
        assert!(ollama.data.is_empty());
        assert_eq!(ollama.embedding, Some(vec![0.3]));
    }

    #[cfg(feature = "http-embeddings")]
    #[test]
    fn test_http_provider_trims_endpoint() {
        let provider = HttpEmbeddingProvider::new("http://localhost:11434/v1/", None, None).unwrap();
        assert_eq!(provider.endpoint, "http://localhost:11434/v1");
        assert_eq!(provider.model, HttpEmbeddingProvider::DEFAULT_MODEL);
    }

    #[cfg(feature = "embeddings")]
    #[tokio::test]
    #[ignore = "requires model download (~90MB)"]
    async fn test_local_embed_query() {
        let provider = LocalEmbeddingProvider::new();
        let vector = provider.embed_query("hello world").await.unwrap();
        assert_eq!(vector.len(), EMBEDDING_DIMENSIONS);
        assert!(provider.is_loaded());
    }

    #[cfg(feature = "embeddings")]
    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires model download (~90MB)"]
    async fn test_local_model_load_does_not_block_timeout() {
        use std::time::{Duration, Instant};

        let provider = LocalEmbeddingProvider::new();
        let start = Instant::now();
        let result = tokio::time::timeout(Duration::from_millis(1), provider.embed_query("hello")).await;

        assert!(result.is_err(), "first load finished within 1ms");
        assert!(start.elapsed() < Duration::from_millis(500));

        // The abandoned load still completes and serves later queries
        let vector = provider.embed_query("hello").await.unwrap();
        assert_eq!(vector.len(), EMBEDDING_DIMENSIONS);
    }
}
