//! Main SDK Entry Point
//!
//! Provides the main SDK struct that ties together all components.

use std::sync::Arc;

use tracing::{info, warn};
use tuls_core::{SearchResult, SqliteChunkStore, StoreConfig};

use crate::config::EmbeddingProviderKind;
use crate::delegation::{DelegationEngine, DelegationOutcome};
use crate::intent::{IntentClassifier, IntentContext};
use crate::knowledge::KnowledgeCache;
use crate::memory::{EmbeddingProvider, HybridSearchManager, MemorySearch, SearchRequest};
use crate::{SDKConfig, SDKResult};

/// Tuls SDK - Main entry point
///
/// The SDK provides access to:
/// - Hybrid memory search over the shared chunk store
/// - The agent knowledge cache
/// - Intent classification and bounded delegation
///
/// # Example
///
/// ```rust,no_run
/// use tuls_sdk::{SDK, SDKConfig};
///
/// async fn example() -> anyhow::Result<()> {
///     let sdk = SDK::new(SDKConfig::new("memory.db", "knowledge"))?;
///
///     let outcome = sdk.process("research GraphQL then implement a sample API", None).await?;
///     println!("{}", outcome.combined_response());
///
///     Ok(())
/// }
/// ```
pub struct SDK {
    /// SDK configuration
    config: SDKConfig,

    /// Shared chunk store
    store: Arc<SqliteChunkStore>,

    /// Hybrid memory search
    memory: Arc<HybridSearchManager<SqliteChunkStore>>,

    /// Agent knowledge cache
    knowledge: Arc<KnowledgeCache>,

    /// Intent classifier, backed by memory
    classifier: IntentClassifier,

    /// Delegation engine
    delegation: DelegationEngine,
}

impl SDK {
    /// Create a new SDK instance
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The chunk store cannot be opened
    /// - The configured embedding provider cannot be built
    pub fn new(config: SDKConfig) -> SDKResult<Self> {
        config.validate()?;
        let provider = build_provider(&config)?;
        Self::assemble(config, provider)
    }

    /// Create an SDK with an explicit embedding provider, ignoring the
    /// provider named in the configuration
    pub fn with_embedding_provider(
        config: SDKConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> SDKResult<Self> {
        config.validate()?;
        Self::assemble(config, Some(provider))
    }

    fn assemble(config: SDKConfig, provider: Option<Arc<dyn EmbeddingProvider>>) -> SDKResult<Self> {
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Arc::new(SqliteChunkStore::open(
            &config.database_path,
            StoreConfig {
                busy_timeout_ms: config.memory.busy_timeout_ms,
            },
        )?);

        let mut memory = HybridSearchManager::new(Arc::clone(&store), config.memory.clone());
        if let Some(provider) = provider {
            info!(provider = provider.name(), "Vector search enabled");
            memory = memory.with_provider(provider);
        }
        let memory = Arc::new(memory);

        let knowledge = Arc::new(KnowledgeCache::from_dir(
            config.knowledge_dir.clone(),
            config.knowledge.clone(),
        ));

        let classifier = IntentClassifier::new().with_memory(
            Arc::clone(&memory) as Arc<dyn MemorySearch>,
            config.memory.history_results,
        );
        let delegation = DelegationEngine::new(config.delegation.clone());

        Ok(Self {
            config,
            store,
            memory,
            knowledge,
            classifier,
            delegation,
        })
    }

    /// Get the SDK configuration
    pub fn config(&self) -> &SDKConfig {
        &self.config
    }

    /// Get the chunk store
    pub fn store(&self) -> &Arc<SqliteChunkStore> {
        &self.store
    }

    /// Get the memory search manager
    pub fn memory(&self) -> &Arc<HybridSearchManager<SqliteChunkStore>> {
        &self.memory
    }

    /// Get the knowledge cache
    pub fn knowledge(&self) -> &Arc<KnowledgeCache> {
        &self.knowledge
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn delegation(&self) -> &DelegationEngine {
        &self.delegation
    }

    /// Search memory. Requests without a namespace search every namespace.
    pub async fn search(&self, text: &str, request: SearchRequest) -> SDKResult<Vec<SearchResult>> {
        self.memory.search(text, &request).await
    }

    /// Classify `message`, route it and follow handoffs.
    ///
    /// `namespace` defaults to the configured default namespace.
    pub async fn process(&self, message: &str, namespace: Option<&str>) -> SDKResult<DelegationOutcome> {
        let namespace = namespace
            .unwrap_or(&self.config.default_namespace)
            .to_string();
        let context = IntentContext::in_namespace(namespace.clone());

        let intent = self.classifier.analyze(message, Some(&context)).await;
        self.delegation
            .process(message, intent, &self.knowledge, Some(namespace))
            .await
    }
}

fn build_provider(config: &SDKConfig) -> SDKResult<Option<Arc<dyn EmbeddingProvider>>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.memory.embedding.provider {
        EmbeddingProviderKind::None => return Ok(None),
        #[cfg(feature = "embeddings")]
        EmbeddingProviderKind::Local => Arc::new(crate::memory::LocalEmbeddingProvider::new()),
        #[cfg(feature = "http-embeddings")]
        EmbeddingProviderKind::Http => Arc::new(
            crate::memory::HttpEmbeddingProvider::from_config(&config.memory.embedding)?,
        ),
        #[allow(unreachable_patterns)]
        kind => {
            warn!(?kind, "Embedding provider not compiled in, using keyword search only");
            return Ok(None);
        }
    };
    Ok(Some(provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegation::ResultStatus;
    use tempfile::TempDir;
    use tuls_core::NewChunk;

    fn write_knowledge(dir: &std::path::Path) {
        let agents = [
            ("orchestrator", "routing"),
            ("research-agent", "research"),
            ("coding-agent", "coding"),
        ];
        std::fs::create_dir_all(dir.join("agents")).unwrap();
        let manifest = serde_json::json!({
            "agents": agents
                .iter()
                .map(|(name, cap)| serde_json::json!({
                    "name": name,
                    "recordPath": format!("agents/{}.json", name),
                    "capabilities": [cap],
                }))
                .collect::<Vec<_>>()
        });
        std::fs::write(dir.join("index.json"), manifest.to_string()).unwrap();
        for (name, cap) in agents {
            let record = serde_json::json!({
                "name": name,
                "capabilities": [cap],
                "systemPrompt": format!("You are {}.", name),
            });
            std::fs::write(dir.join(format!("agents/{}.json", name)), record.to_string()).unwrap();
        }
    }

    fn sdk(temp: &TempDir) -> SDK {
        let knowledge_dir = temp.path().join("knowledge");
        write_knowledge(&knowledge_dir);
        SDK::new(SDKConfig::new(temp.path().join("data/memory.db"), knowledge_dir)).unwrap()
    }

    #[tokio::test]
    async fn test_process_end_to_end() {
        let temp = TempDir::new().unwrap();
        let sdk = sdk(&temp);

        let outcome = sdk
            .process("research GraphQL then implement a sample API", None)
            .await
            .unwrap();

        assert!(!outcome.used_fallback_agent);
        assert_eq!(outcome.initial_agent, "research-agent");
        assert_eq!(outcome.handoffs.len(), 1);
        assert_eq!(outcome.result.agent, "coding-agent");
        assert_eq!(outcome.result.status, ResultStatus::Completed);
        assert!(temp.path().join("data/memory.db").exists());
    }

    #[tokio::test]
    async fn test_history_routes_and_boosts() {
        let temp = TempDir::new().unwrap();
        let sdk = sdk(&temp);

        sdk.store()
            .index_source(
                "sessions/2024-05-01.md",
                "main",
                vec![
                    NewChunk::new("coding-agent built the GraphQL resolver and its tests"),
                    NewChunk::new("weekly grocery list: apples, bread"),
                    NewChunk::new("notes about the garden irrigation timer"),
                    NewChunk::new("travel itinerary for the conference"),
                ],
            )
            .unwrap();

        let hits = sdk
            .search("GraphQL resolver", SearchRequest::in_namespace("main"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let outcome = sdk.process("research GraphQL", None).await.unwrap();
        assert_eq!(
            outcome.intent.historical_agents(),
            &["coding-agent".to_string()]
        );
        assert!(outcome.intent.confidence > 0.6);
        assert!(outcome.intent.confidence <= 0.9);
        assert_eq!(outcome.initial_agent, "coding-agent");
    }

    #[tokio::test]
    async fn test_missing_knowledge_dir_falls_back() {
        let temp = TempDir::new().unwrap();
        let sdk = SDK::new(SDKConfig::new(
            temp.path().join("memory.db"),
            temp.path().join("no-such-dir"),
        ))
        .unwrap();

        let outcome = sdk.process("xyz abc qwerty", Some("work")).await.unwrap();
        assert!(outcome.used_fallback_agent);
        assert_eq!(outcome.initial_agent, "orchestrator");
        assert!(outcome.result.is_completed());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let temp = TempDir::new().unwrap();
        let config = SDKConfig::new(temp.path().join("memory.db"), temp.path().join("k"))
            .with_namespace("  ");
        assert!(SDK::new(config).is_err());
    }
}
