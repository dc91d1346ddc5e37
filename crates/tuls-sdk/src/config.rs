//! SDK Configuration
//!
//! Defines configuration options for the Tuls SDK.
//!
//! Standard directory structure:
//! ```text
//! ~/.tuls/                  # or $TULS_HOME
//! ├── config.toml           # Main configuration
//! ├── memory.db             # Chunk store
//! └── knowledge/
//!     ├── index.json        # Knowledge index manifest
//!     └── agents/*.json     # Agent records
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::SDKResult;

/// Environment variable overriding the Tuls home directory
pub const HOME_ENV: &str = "TULS_HOME";

/// SDK configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SDKConfig {
    /// Path to the SQLite chunk store
    pub database_path: PathBuf,

    /// Directory holding the knowledge index manifest and agent records
    pub knowledge_dir: PathBuf,

    /// Namespace used when the caller supplies none
    pub default_namespace: String,

    /// Memory search configuration
    pub memory: MemoryConfig,

    /// Knowledge cache configuration
    pub knowledge: KnowledgeConfig,

    /// Delegation configuration
    pub delegation: DelegationConfig,
}

impl Default for SDKConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("memory.db"),
            knowledge_dir: PathBuf::from("knowledge"),
            default_namespace: "main".into(),
            memory: MemoryConfig::default(),
            knowledge: KnowledgeConfig::default(),
            delegation: DelegationConfig::default(),
        }
    }
}

/// Hybrid memory search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Timeout for one query embedding in milliseconds (default: 5000)
    pub embedding_timeout_ms: u64,

    /// Chunk store busy wait in milliseconds (default: 5000)
    pub busy_timeout_ms: u64,

    /// Maximum results per search (default: 10)
    pub max_results: usize,

    /// Minimum score for a result to be returned (default: 0.0)
    pub min_score: f64,

    /// Results fetched when classifying against history (default: 5)
    pub history_results: usize,

    /// Embedding provider
    pub embedding: EmbeddingConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embedding_timeout_ms: 5000,
            busy_timeout_ms: 5000,
            max_results: 10,
            min_score: 0.0,
            history_results: 5,
            embedding: EmbeddingConfig::default(),
        }
    }
}

/// Which embedding provider to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// Keyword-only search
    None,
    /// Local fastembed model (requires the `embeddings` feature)
    Local,
    /// OpenAI-compatible HTTP endpoint (requires the `http-embeddings` feature)
    Http,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,

    /// Base URL for the HTTP provider, e.g. `http://localhost:11434/v1`
    pub endpoint: Option<String>,

    /// Model name sent to the HTTP provider
    pub model: Option<String>,

    /// Environment variable holding the HTTP provider's API key
    pub api_key_env: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::None,
            endpoint: None,
            model: None,
            api_key_env: None,
        }
    }
}

/// Knowledge cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Manifest file name inside the knowledge directory (default: index.json)
    pub manifest_file: String,

    /// Maximum hydrated agent records held (default: 50)
    pub cache_capacity: usize,

    /// Seconds a missing knowledge source stays negatively cached (default: 60)
    pub negative_ttl_secs: u64,

    /// Hit rate below which health reports a warning (default: 0.8)
    pub hit_rate_warning: f64,

    /// Utilization above which heavy eviction is critical (default: 0.9)
    pub utilization_critical: f64,

    /// Share of lookups that evicted, above which eviction counts as heavy (default: 0.2)
    pub eviction_rate_critical: f64,

    /// Average hydrate latency in ms above which health warns (default: 10)
    pub slow_load_ms: f64,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            manifest_file: "index.json".into(),
            cache_capacity: 50,
            negative_ttl_secs: 60,
            hit_rate_warning: 0.8,
            utilization_critical: 0.9,
            eviction_rate_critical: 0.2,
            slow_load_ms: 10.0,
        }
    }
}

/// Delegation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegationConfig {
    /// Maximum handoffs per request (default: 2, never more than 2)
    pub max_handoffs: usize,

    /// Agent used when nothing else matches (default: orchestrator)
    pub default_agent: String,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            max_handoffs: MAX_HANDOFFS,
            default_agent: "orchestrator".into(),
        }
    }
}

/// Hard upper bound on handoffs per request
pub const MAX_HANDOFFS: usize = 2;

impl SDKConfig {
    /// Create a new SDK config with the given store and knowledge locations
    pub fn new(database_path: impl Into<PathBuf>, knowledge_dir: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            knowledge_dir: knowledge_dir.into(),
            ..Default::default()
        }
    }

    /// Load configuration from `$TULS_HOME/config.toml` (or `~/.tuls/config.toml`).
    ///
    /// Missing files fall back to defaults rooted in the home directory.
    pub fn load() -> SDKResult<Self> {
        let home = home_dir();
        let path = home.join("config.toml");

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        if config.database_path.is_relative() {
            config.database_path = home.join(&config.database_path);
        }
        if config.knowledge_dir.is_relative() {
            config.knowledge_dir = home.join(&config.knowledge_dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> SDKResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse TOML config text; unspecified fields take defaults
    pub fn from_toml_str(text: &str) -> SDKResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Set the default namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }

    /// Set memory configuration
    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    /// Set knowledge configuration
    pub fn with_knowledge(mut self, knowledge: KnowledgeConfig) -> Self {
        self.knowledge = knowledge;
        self
    }

    /// Set delegation configuration
    pub fn with_delegation(mut self, delegation: DelegationConfig) -> Self {
        self.delegation = delegation;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.default_namespace.trim().is_empty() {
            return Err(ConfigValidationError::MissingNamespace);
        }

        if self.memory.embedding_timeout_ms == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "memory.embedding_timeout_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        if !(0.0..=1.0).contains(&self.memory.min_score) {
            return Err(ConfigValidationError::InvalidValue {
                field: "memory.min_score".into(),
                message: "must be between 0 and 1".into(),
            });
        }

        if self.knowledge.cache_capacity == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "knowledge.cache_capacity".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.delegation.max_handoffs > MAX_HANDOFFS {
            return Err(ConfigValidationError::InvalidValue {
                field: "delegation.max_handoffs".into(),
                message: format!("must be at most {}", MAX_HANDOFFS),
            });
        }

        if self.memory.embedding.provider == EmbeddingProviderKind::Http
            && self.memory.embedding.endpoint.is_none()
        {
            return Err(ConfigValidationError::InvalidValue {
                field: "memory.embedding.endpoint".into(),
                message: "required for the http provider".into(),
            });
        }

        Ok(())
    }
}

/// Tuls home directory: `$TULS_HOME`, else `~/.tuls`
pub fn home_dir() -> PathBuf {
    std::env::var(HOME_ENV).map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tuls")
    })
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("default_namespace is required")]
    MissingNamespace,

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SDKConfig::default();
        assert_eq!(config.memory.embedding_timeout_ms, 5000);
        assert_eq!(config.memory.busy_timeout_ms, 5000);
        assert_eq!(config.knowledge.cache_capacity, 50);
        assert_eq!(config.knowledge.negative_ttl_secs, 60);
        assert_eq!(config.delegation.max_handoffs, 2);
        assert_eq!(config.delegation.default_agent, "orchestrator");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = SDKConfig::new("test.db", "/srv/knowledge").with_namespace("agent:main");

        assert_eq!(config.database_path, PathBuf::from("test.db"));
        assert_eq!(config.knowledge_dir, PathBuf::from("/srv/knowledge"));
        assert_eq!(config.default_namespace, "agent:main");
    }

    #[test]
    fn test_partial_toml_takes_defaults() {
        let config = SDKConfig::from_toml_str(
            r#"
            default_namespace = "team"

            [knowledge]
            cache_capacity = 8

            [memory.embedding]
            provider = "http"
            endpoint = "http://localhost:11434/v1"
            "#,
        )
        .unwrap();

        assert_eq!(config.default_namespace, "team");
        assert_eq!(config.knowledge.cache_capacity, 8);
        assert_eq!(config.knowledge.negative_ttl_secs, 60);
        assert_eq!(config.memory.embedding.provider, EmbeddingProviderKind::Http);
        assert_eq!(config.memory.max_results, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SDKConfig::default();
        config.default_namespace = String::new();
        assert!(config.validate().is_err());

        let mut config = SDKConfig::default();
        config.delegation.max_handoffs = 3;
        assert!(config.validate().is_err());

        let mut config = SDKConfig::default();
        config.knowledge.cache_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = SDKConfig::default();
        config.memory.embedding.provider = EmbeddingProviderKind::Http;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        assert!(SDKConfig::from_toml_str("default_namespace = [").is_err());
    }
}
