//! SDK Error Types
//!
//! Defines error types for the Tuls SDK.

use thiserror::Error;

/// SDK Result type alias
pub type SDKResult<T> = Result<T, SDKError>;

/// SDK errors
#[derive(Debug, Error)]
pub enum SDKError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    /// Chunk store error (busy, corrupt, database)
    #[error("store error: {0}")]
    Store(#[from] tuls_core::Error),

    /// No agent matched an explicit lookup
    #[error("agent not found: {requested} (known agents: {})", .known.join(", "))]
    AgentNotFound {
        requested: String,
        known: Vec<String>,
    },

    /// The knowledge base manifest is absent
    #[error("knowledge source missing: {path}")]
    KnowledgeSourceMissing { path: String },

    /// An agent record could not be hydrated
    #[error("invalid agent record {name}: {message}")]
    InvalidRecord { name: String, message: String },

    /// Embedding provider failed
    #[error("embedding unavailable: {message}")]
    EmbeddingUnavailable { message: String },

    /// Entry not found
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Config file parse error
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SDKError {
    /// Create an agent not found error
    pub fn agent_not_found(requested: impl Into<String>, known: Vec<String>) -> Self {
        Self::AgentNotFound {
            requested: requested.into(),
            known,
        }
    }

    /// Create a knowledge source missing error
    pub fn knowledge_source_missing(path: impl Into<String>) -> Self {
        Self::KnowledgeSourceMissing { path: path.into() }
    }

    /// Create an invalid record error
    pub fn invalid_record(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Check if this error is an agent lookup failure
    pub fn is_agent_not_found(&self) -> bool {
        matches!(self, Self::AgentNotFound { .. })
    }

    /// Check if this error is a missing knowledge source
    pub fn is_knowledge_source_missing(&self) -> bool {
        matches!(self, Self::KnowledgeSourceMissing { .. })
    }

    /// Check if this error is fatal store corruption
    pub fn is_store_corrupt(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_corrupt())
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SDKError::agent_not_found("ghost", vec!["alpha".into(), "beta".into()]);
        assert!(err.is_agent_not_found());
        assert!(err.to_string().contains("ghost"));
        assert!(err.to_string().contains("alpha, beta"));

        let err = SDKError::knowledge_source_missing("/tmp/index.json");
        assert!(err.is_knowledge_source_missing());

    }

    #[test]
    fn test_store_corruption_detected() {
        let err: SDKError = tuls_core::Error::StoreCorrupt("bad page".into()).into();
        assert!(err.is_store_corrupt());

        let err: SDKError = tuls_core::Error::StoreBusy { timeout_ms: 5000 }.into();
        assert!(!err.is_store_corrupt());
    }
}
